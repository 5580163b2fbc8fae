//! The ordered ring of zone colors sampled along the TV's border.
//!
//! Zones are laid out walking the border counter-clockwise from the bottom
//! left corner:
//!
//! ```text
//!  [4]  [5]  [6]  [7]  [8]
//!  [3]                 [9]
//!  [2]                 [10]
//!  [1]                 [11]
//!  [0]                 [12]
//! ```
//!
//! `0..L` is the left edge bottom to top, `L..L+T` the top edge left to right
//! and `L+T..2L+T` the right edge top to bottom.

use crate::color::{Color, ColorSum};
use crate::error::AmbiError;
use crate::tv::protocol::{Edge, Layer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneModel {
    colors: Vec<Color>,
    /// Number of zones on each vertical edge
    sides: usize,
}

impl ZoneModel {
    pub fn from_layer(layer: &Layer) -> Result<ZoneModel, AmbiError> {
        let sides = layer.left.len();

        if layer.right.len() != sides {
            return Err(AmbiError::MalformedPayload(format!(
                "left edge has {} zones but right edge has {}",
                sides,
                layer.right.len()
            )));
        }

        let mut colors = Vec::with_capacity(2 * sides + layer.top.len());
        colors.extend(edge_colors(&layer.left));
        colors.extend(edge_colors(&layer.top));
        // The TV sends the right edge bottom to top
        colors.extend(edge_colors(&layer.right).rev());

        if colors.is_empty() {
            return Err(AmbiError::MalformedPayload("payload has no zones".into()));
        }

        Ok(ZoneModel { colors, sides })
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn sides(&self) -> usize {
        self.sides
    }

    pub fn average(&self, indices: &[usize]) -> Result<Color, AmbiError> {
        average(&self.colors, indices)
    }

    /// Draws the border as text, the top edge first and then one line per
    /// row of the vertical edges.
    pub fn render(&self) -> Vec<String> {
        let top = &self.colors[self.sides..self.colors.len() - self.sides];
        let right = &self.colors[self.colors.len() - self.sides..];

        let mut lines = Vec::with_capacity(self.sides + 1);
        lines.push(top.iter().map(Color::swatch).collect::<Vec<_>>().join(" "));

        let gap = " ".repeat(top.len().saturating_sub(2) * 3 + 1);
        for row in 0..self.sides {
            let left = self.colors[self.sides - 1 - row];
            lines.push(format!("{}{}{}", left.swatch(), gap, right[row].swatch()));
        }

        lines
    }
}

fn edge_colors(edge: &Edge) -> impl DoubleEndedIterator<Item = Color> + '_ {
    edge.values().map(|c| Color::saturating(c.r, c.g, c.b))
}

/// Channel-wise mean of the selected zones, truncated toward zero.
///
/// Indices may repeat, which weights that zone more.
pub fn average(zones: &[Color], indices: &[usize]) -> Result<Color, AmbiError> {
    if zones.is_empty() || indices.is_empty() {
        return Err(AmbiError::EmptyModel);
    }

    let mut sum = ColorSum::new();
    for &index in indices {
        let color = zones.get(index).ok_or(AmbiError::IndexOutOfRange {
            index,
            len: zones.len(),
        })?;
        sum.add(*color);
    }

    sum.mean().ok_or(AmbiError::EmptyModel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tv::protocol::Processed;
    use serde_json::{json, Value};

    fn layer(value: Value) -> Layer {
        match value {
            Value::Object(map) => Processed::from_document(map).unwrap().layer1,
            _ => panic!("test document must be an object"),
        }
    }

    fn edge(prefix: &str, values: &[u8]) -> Value {
        let mut map = serde_json::Map::new();
        for (i, v) in values.iter().enumerate() {
            map.insert(format!("{}{}", prefix, i), json!({"r": v, "g": v, "b": v}));
        }
        Value::Object(map)
    }

    fn grey(v: u8) -> Color {
        Color::new(v, v, v)
    }

    #[test]
    fn builds_the_documented_layout() {
        let model = ZoneModel::from_layer(&layer(json!({
            "layer1": {
                "left": { "a": {"r": 0, "g": 0, "b": 0}, "b": {"r": 10, "g": 10, "b": 10} },
                "top": {},
                "right": { "c": {"r": 20, "g": 20, "b": 20}, "d": {"r": 30, "g": 30, "b": 30} }
            }
        })))
        .unwrap();

        assert_eq!(model.colors(), [grey(0), grey(10), grey(30), grey(20)]);
        assert_eq!(model.average(&[0, 1]), Ok(grey(5)));
    }

    #[test]
    fn length_and_right_reversal_hold_for_any_shape() {
        for sides in 1..5u8 {
            for top in 0..7u8 {
                let left: Vec<u8> = (0..sides).collect();
                let top_values: Vec<u8> = (100..100 + top).collect();
                let right: Vec<u8> = (200..200 + sides).collect();

                let model = ZoneModel::from_layer(&layer(json!({
                    "layer1": {
                        "left": edge("l", &left),
                        "top": edge("t", &top_values),
                        "right": edge("r", &right),
                    }
                })))
                .unwrap();

                let (l, t) = (sides as usize, top as usize);
                assert_eq!(model.len(), 2 * l + t);
                assert_eq!(model.sides(), l);
                assert_eq!(model.colors()[l + t], grey(*right.last().unwrap()));
                assert_eq!(model.colors()[2 * l + t - 1], grey(right[0]));
                assert_eq!(model.colors()[l], if t > 0 { grey(100) } else { grey(*right.last().unwrap()) });
            }
        }
    }

    #[test]
    fn rejects_mismatched_vertical_edges() {
        let result = ZoneModel::from_layer(&layer(json!({
            "layer1": { "left": edge("l", &[1, 2]), "top": edge("t", &[3]), "right": edge("r", &[4]) }
        })));

        assert!(matches!(result, Err(AmbiError::MalformedPayload(_))));
    }

    #[test]
    fn rejects_payload_without_zones() {
        let result = ZoneModel::from_layer(&layer(json!({
            "layer1": { "left": {}, "top": {}, "right": {} }
        })));

        assert!(matches!(result, Err(AmbiError::MalformedPayload(_))));
    }

    #[test]
    fn singleton_selection_is_identity() {
        let zones = [Color::new(1, 2, 3), Color::new(250, 7, 99), Color::new(0, 255, 13)];

        for (i, zone) in zones.iter().enumerate() {
            assert_eq!(average(&zones, &[i]), Ok(*zone));
        }
    }

    #[test]
    fn selection_order_does_not_matter() {
        let zones = [Color::new(1, 200, 3), Color::new(250, 7, 99), Color::new(0, 255, 14)];

        let forward = average(&zones, &[0, 1, 2, 2]).unwrap();
        assert_eq!(average(&zones, &[2, 1, 2, 0]), Ok(forward));
        assert_eq!(average(&zones, &[2, 2, 0, 1]), Ok(forward));
    }

    #[test]
    fn duplicates_weight_a_zone() {
        let zones = [grey(0), grey(90)];

        assert_eq!(average(&zones, &[0, 1, 1]), Ok(grey(60)));
    }

    #[test]
    fn out_of_range_index_fails() {
        let zones = [grey(1), grey(2)];

        assert_eq!(average(&zones, &[0, 2]), Err(AmbiError::IndexOutOfRange { index: 2, len: 2 }));
        assert_eq!(average(&zones, &[usize::MAX]), Err(AmbiError::IndexOutOfRange { index: usize::MAX, len: 2 }));
    }

    #[test]
    fn empty_inputs_fail() {
        assert_eq!(average(&[], &[0]), Err(AmbiError::EmptyModel));
        assert_eq!(average(&[grey(1)], &[]), Err(AmbiError::EmptyModel));
    }

    #[test]
    fn render_pairs_rows_from_the_top() {
        let model = ZoneModel::from_layer(&layer(json!({
            "layer1": {
                "left": edge("l", &[1, 2]),
                "top": edge("t", &[3, 4, 5]),
                "right": edge("r", &[7, 6]),
            }
        })))
        .unwrap();

        let lines = model.render();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(&grey(3).swatch()));
        // Top row of the sides: top left zone and top right zone
        assert!(lines[1].starts_with(&grey(2).swatch()));
        assert!(lines[1].ends_with(&grey(6).swatch()));
        assert!(lines[2].starts_with(&grey(1).swatch()));
        assert!(lines[2].ends_with(&grey(7).swatch()));
    }
}
