use serde::{Deserialize, Serialize};

use crate::core::petri_net::{PlaceType, TransitionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Fill and outline colour of a node (as `#RRGGBB`)
pub struct NodeColors {
    /// Fill colour
    pub fill: String,
    /// Outline colour
    pub outline: String,
}

impl NodeColors {
    fn new(fill: &str, outline: &str) -> Self {
        Self {
            fill: fill.to_string(),
            outline: outline.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Colours per [`PlaceType`]
pub struct PlaceColors {
    /// Action places
    pub action: NodeColors,
    /// Predicate places
    pub predicate: NodeColors,
    /// Task places
    pub task: NodeColors,
    /// Regular places
    pub regular: NodeColors,
}

impl Default for PlaceColors {
    fn default() -> Self {
        Self {
            action: NodeColors::new("#00EE00", "#00AA00"),
            predicate: NodeColors::new("#0000EE", "#0000AA"),
            task: NodeColors::new("#EEEE00", "#AAAA00"),
            regular: NodeColors::new("#777777", "#777777"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Colours per [`TransitionType`]
pub struct TransitionColors {
    /// Immediate transitions
    pub immediate: NodeColors,
    /// Stochastic transitions
    pub stochastic: NodeColors,
}

impl Default for TransitionColors {
    fn default() -> Self {
        Self {
            immediate: NodeColors::new("#444444", "#444444"),
            stochastic: NodeColors::new("#FFFFFF", "#444444"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
///
/// Presentation settings written to the `graphics` blocks of encoded nodes
///
/// Sizes are multiplied by the scale of the net.
/// Can be loaded from JSON, missing fields use the defaults.
///
pub struct PnmlStyle {
    /// Outline width
    pub line_width: f64,
    /// Radius of places
    pub place_radius: f64,
    /// Vertical label offset of places
    pub place_label_padding: f64,
    /// Half of the long side of transitions
    pub transition_half_large: f64,
    /// Half of the short side of transitions
    pub transition_half_small: f64,
    /// Vertical label offset of horizontal transitions
    pub horizontal_label_padding: f64,
    /// Vertical label offset of vertical transitions
    pub vertical_label_padding: f64,
    /// Place colours
    pub place_colors: PlaceColors,
    /// Transition colours
    pub transition_colors: TransitionColors,
    /// Overwrite label offsets of nodes loaded from a document
    ///
    /// Label offsets of newly created elements are always written.
    pub update_label_offset: bool,
}

impl Default for PnmlStyle {
    fn default() -> Self {
        Self {
            line_width: 2.0,
            place_radius: 25.0,
            place_label_padding: 40.0,
            transition_half_large: 40.0,
            transition_half_small: 7.5,
            horizontal_label_padding: 22.5,
            vertical_label_padding: 55.0,
            place_colors: PlaceColors::default(),
            transition_colors: TransitionColors::default(),
            update_label_offset: true,
        }
    }
}

impl PnmlStyle {
    /// Colours of places of the given type
    pub fn place_colors(&self, place_type: PlaceType) -> &NodeColors {
        match place_type {
            PlaceType::Action => &self.place_colors.action,
            PlaceType::Predicate => &self.place_colors.predicate,
            PlaceType::Task => &self.place_colors.task,
            PlaceType::Regular => &self.place_colors.regular,
        }
    }

    /// Colours of transitions of the given type
    pub fn transition_colors(&self, transition_type: TransitionType) -> &NodeColors {
        match transition_type {
            TransitionType::Immediate => &self.transition_colors.immediate,
            TransitionType::Stochastic => &self.transition_colors.stochastic,
        }
    }

    /// Half width and half height of a transition (unscaled)
    pub fn transition_half_size(&self, is_horizontal: bool) -> (f64, f64) {
        if is_horizontal {
            (self.transition_half_large, self.transition_half_small)
        } else {
            (self.transition_half_small, self.transition_half_large)
        }
    }

    /// Vertical label offset of a transition (unscaled)
    pub fn transition_label_padding(&self, is_horizontal: bool) -> f64 {
        if is_horizontal {
            self.horizontal_label_padding
        } else {
            self.vertical_label_padding
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PnmlStyle;
    use crate::core::petri_net::PlaceType;

    #[test]
    fn partial_json_uses_defaults() {
        let style: PnmlStyle = serde_json::from_str(
            r##"{"line_width": 1.5, "place_colors": {"task": {"fill": "#123456", "outline": "#000000"}}}"##,
        )
        .unwrap();
        assert_eq!(style.line_width, 1.5);
        assert_eq!(style.place_radius, 25.0);
        assert_eq!(style.place_colors(PlaceType::Task).fill, "#123456");
        assert_eq!(style.place_colors(PlaceType::Action).fill, "#00EE00");
        assert!(style.update_label_offset);
    }
}
