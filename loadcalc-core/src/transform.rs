//! 坐标变换：纵向平移、相对坐标采集与绝对坐标还原。
//!
//! 所有函数都返回显式克隆后的新数据，不修改输入。方向量（椭圆法向、长轴）不参与平移。

use crate::drawing::{
    Arc, Circle, DrawingObject, DrawingObjectSet, Ellipse, Line, PlainText, Polyline, RichText,
    Solid,
};
use crate::geometry::Vector3;

/// 可整体平移的图元。
pub trait Translate {
    fn translate(&mut self, offset: Vector3);
}

fn move_point(point: &mut Vector3, offset: Vector3) {
    *point = point.translate(offset);
}

impl Translate for Polyline {
    fn translate(&mut self, offset: Vector3) {
        self.vertices.iter_mut().for_each(|vertex| move_point(vertex, offset));
    }
}

impl Translate for Line {
    fn translate(&mut self, offset: Vector3) {
        move_point(&mut self.start, offset);
        move_point(&mut self.end, offset);
    }
}

impl Translate for Arc {
    fn translate(&mut self, offset: Vector3) {
        move_point(&mut self.center, offset);
    }
}

impl Translate for Circle {
    fn translate(&mut self, offset: Vector3) {
        move_point(&mut self.center, offset);
    }
}

impl Translate for Ellipse {
    fn translate(&mut self, offset: Vector3) {
        move_point(&mut self.center, offset);
    }
}

impl Translate for RichText {
    fn translate(&mut self, offset: Vector3) {
        move_point(&mut self.location, offset);
    }
}

impl Translate for PlainText {
    fn translate(&mut self, offset: Vector3) {
        move_point(&mut self.location, offset);
        move_point(&mut self.alignment_point, offset);
    }
}

impl Translate for Solid {
    fn translate(&mut self, offset: Vector3) {
        self.vertices.iter_mut().for_each(|vertex| move_point(vertex, offset));
    }
}

impl Translate for DrawingObject {
    fn translate(&mut self, offset: Vector3) {
        match self {
            DrawingObject::Polyline(polyline) => polyline.translate(offset),
            DrawingObject::Line(line) => line.translate(offset),
            DrawingObject::Arc(arc) => arc.translate(offset),
            DrawingObject::Circle(circle) => circle.translate(offset),
            DrawingObject::Ellipse(ellipse) => ellipse.translate(offset),
            DrawingObject::RichText(text) => text.translate(offset),
            DrawingObject::PlainText(text) => text.translate(offset),
            DrawingObject::Solid(solid) => solid.translate(offset),
        }
    }
}

fn translate_all<T: Translate>(items: &mut [T], offset: Vector3) {
    items.iter_mut().for_each(|item| item.translate(offset));
}

impl Translate for DrawingObjectSet {
    fn translate(&mut self, offset: Vector3) {
        translate_all(&mut self.polylines, offset);
        translate_all(&mut self.lines, offset);
        translate_all(&mut self.arcs, offset);
        translate_all(&mut self.circles, offset);
        translate_all(&mut self.ellipses, offset);
        translate_all(&mut self.rich_texts, offset);
        translate_all(&mut self.plain_texts, offset);
        translate_all(&mut self.solids, offset);
    }
}

/// 返回纵向平移 `dy` 后的深拷贝，X/Z 不变。
pub fn shift(set: &DrawingObjectSet, dy: f64) -> DrawingObjectSet {
    let mut shifted = set.clone();
    shifted.translate(Vector3::new(0.0, dy, 0.0));
    shifted
}

/// 将宿主中的绝对坐标图元改写为以 `origin` 为原点的局部图元集合。
pub fn capture_relative<'a, I>(entities: I, origin: Vector3) -> DrawingObjectSet
where
    I: IntoIterator<Item = &'a DrawingObject>,
{
    let offset = Vector3::ZERO.relative_to(origin);
    let mut set = DrawingObjectSet::new();
    for entity in entities {
        let mut local = entity.clone();
        local.translate(offset);
        set.push(local);
    }
    set
}

/// `capture_relative` 的逆操作：把局部坐标加上 `base` 得到宿主中的绝对坐标。
pub fn restore_absolute(set: &DrawingObjectSet, base: Vector3) -> DrawingObjectSet {
    let mut absolute = set.clone();
    absolute.translate(base);
    absolute
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::HorizontalMode;
    use proptest::prelude::*;

    fn sample_entities(base: f64) -> Vec<DrawingObject> {
        vec![
            DrawingObject::Polyline(Polyline {
                layer: "E-TEXT".to_string(),
                line_type: "ByLayer".to_string(),
                closed: true,
                vertices: vec![
                    Vector3::xy(base, base),
                    Vector3::xy(base - 7.0, base),
                    Vector3::xy(base - 7.0, base - 0.75),
                ],
            }),
            DrawingObject::Line(Line {
                layer: "0".to_string(),
                start: Vector3::xy(base, 0.5),
                end: Vector3::xy(base + 2.0, 0.5),
            }),
            DrawingObject::Arc(Arc {
                layer: "0".to_string(),
                center: Vector3::xy(base + 1.0, base - 1.0),
                radius: 0.5,
                start_angle: 0.0,
                end_angle: 1.5,
            }),
            DrawingObject::Circle(Circle {
                layer: "0".to_string(),
                center: Vector3::new(base, base, 0.25),
                radius: 0.125,
            }),
            DrawingObject::Ellipse(Ellipse {
                layer: "0".to_string(),
                unit_normal: Vector3::new(0.0, 0.0, 1.0),
                center: Vector3::xy(base + 3.0, base),
                major_axis: Vector3::xy(2.0, 0.0),
                major_radius: 2.0,
                minor_radius: 1.0,
                start_angle: 0.0,
                end_angle: 6.0,
            }),
            DrawingObject::RichText(RichText {
                layer: "E-TEXT".to_string(),
                contents: "Title".to_string(),
                location: Vector3::xy(base - 6.875, base - 0.125),
                height: 0.125,
                ..RichText::default()
            }),
            DrawingObject::PlainText(PlainText {
                layer: "E-TEXT".to_string(),
                contents: "1500VA".to_string(),
                location: Vector3::xy(base - 0.125, base - 0.5),
                alignment_point: Vector3::xy(base - 0.125, base - 0.5),
                horizontal_mode: HorizontalMode::Right,
                ..PlainText::default()
            }),
            DrawingObject::Solid(Solid {
                layer: "0".to_string(),
                vertices: [
                    Vector3::xy(base, base),
                    Vector3::xy(base + 1.0, base),
                    Vector3::xy(base, base + 1.0),
                    Vector3::xy(base + 1.0, base + 1.0),
                ],
            }),
        ]
    }

    #[test]
    fn shift_moves_only_positions() {
        let set = DrawingObjectSet::from_objects(sample_entities(0.0));
        let shifted = shift(&set, -1.75);

        assert_eq!(shifted.polylines[0].vertices[2], Vector3::xy(-7.0, -2.5));
        assert_eq!(shifted.lines[0].start, Vector3::xy(0.0, -1.25));
        assert_eq!(shifted.circles[0].center, Vector3::new(0.0, -1.75, 0.25));
        assert_eq!(shifted.ellipses[0].center, Vector3::xy(3.0, -1.75));
        assert_eq!(shifted.ellipses[0].major_axis, Vector3::xy(2.0, 0.0));
        assert_eq!(shifted.ellipses[0].unit_normal, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(shifted.plain_texts[0].alignment_point, Vector3::xy(-0.125, -2.25));
        assert_eq!(shifted.solids[0].vertices[3], Vector3::xy(1.0, -0.75));
        assert_eq!(shifted.row_count, set.row_count);

        // 原集合保持不变
        assert_eq!(set.polylines[0].vertices[2], Vector3::xy(-7.0, -0.75));
    }

    #[test]
    fn set_and_single_objects_translate_alike() {
        let offset = Vector3::new(-3.5, 2.25, 0.5);
        let mut set = DrawingObjectSet::from_objects(sample_entities(1.0));
        set.translate(offset);

        let moved: Vec<DrawingObject> = sample_entities(1.0)
            .into_iter()
            .map(|mut object| {
                object.translate(offset);
                object
            })
            .collect();
        assert_eq!(set.objects(), moved);
    }

    #[test]
    fn capture_makes_coordinates_origin_relative() {
        let entities = sample_entities(100.0);
        let origin = Vector3::xy(100.0, 100.0);
        let captured = capture_relative(&entities, origin);

        assert_eq!(captured.polylines[0].vertices[0], Vector3::ZERO);
        assert_eq!(captured.arcs[0].center, Vector3::xy(1.0, -1.0));
        assert_eq!(captured.rich_texts[0].location, Vector3::xy(-6.875, -0.125));
        assert_eq!(captured.len(), entities.len());
    }

    fn dyadic() -> impl Strategy<Value = f64> {
        (-80_000i32..80_000).prop_map(|raw| f64::from(raw) / 8.0)
    }

    proptest! {
        #[test]
        fn shift_is_additive(a in dyadic(), b in dyadic(), base in dyadic()) {
            let set = DrawingObjectSet::from_objects(sample_entities(base));
            prop_assert_eq!(shift(&shift(&set, a), b), shift(&set, a + b));
        }

        #[test]
        fn capture_then_restore_is_identity(
            base in dyadic(),
            ox in dyadic(),
            oy in dyadic(),
            oz in dyadic(),
        ) {
            let entities = sample_entities(base);
            let origin = Vector3::new(ox, oy, oz);
            let restored = restore_absolute(&capture_relative(&entities, origin), origin);
            prop_assert_eq!(restored.objects(), entities);
        }
    }
}
