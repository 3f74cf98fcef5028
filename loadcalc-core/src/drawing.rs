//! 矢量图元模型。所有坐标默认相对于隐含的局部原点。

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds2D, Vector3};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Polyline {
    pub layer: String,
    pub line_type: String,
    pub closed: bool,
    #[serde(rename = "Vectors")]
    pub vertices: Vec<Vector3>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Line {
    pub layer: String,
    #[serde(rename = "StartPoint")]
    pub start: Vector3,
    #[serde(rename = "EndPoint")]
    pub end: Vector3,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Arc {
    pub layer: String,
    pub center: Vector3,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Circle {
    pub layer: String,
    pub center: Vector3,
    pub radius: f64,
}

/// 椭圆。`unit_normal` 与 `major_axis` 为方向量，平移时保持不变。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Ellipse {
    pub layer: String,
    pub unit_normal: Vector3,
    pub center: Vector3,
    pub major_axis: Vector3,
    pub major_radius: f64,
    pub minor_radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Ellipse {
    /// 短轴与长轴之比；任一半径为 0 时返回 0。
    pub fn radius_ratio(&self) -> f64 {
        if self.major_radius == 0.0 || self.minor_radius == 0.0 {
            0.0
        } else {
            self.minor_radius / self.major_radius
        }
    }
}

/// 多行文字（宿主中的 MText），模板占位符即以此形式存在。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RichText {
    pub layer: String,
    pub style: String,
    pub justification: String,
    pub contents: String,
    pub location: Vector3,
    #[serde(rename = "LineSpaceDistance")]
    pub line_spacing: f64,
    #[serde(rename = "TextHeight")]
    pub height: f64,
    pub width: f64,
    pub rotation: f64,
}

impl RichText {
    #[inline]
    pub fn is_left_justified(&self) -> bool {
        self.justification.contains("Left")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HorizontalMode {
    #[default]
    #[serde(rename = "TextLeft")]
    Left,
    #[serde(rename = "TextCenter")]
    Center,
    #[serde(rename = "TextRight")]
    Right,
}

/// 单行文字。`Left` 模式以 `location` 定位，其余模式由宿主按对齐点排版。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlainText {
    pub layer: String,
    pub style: String,
    pub contents: String,
    pub location: Vector3,
    pub height: f64,
    pub rotation: f64,
    #[serde(alias = "LineSpaceDistance")]
    pub width_factor: f64,
    pub alignment_point: Vector3,
    pub horizontal_mode: HorizontalMode,
    #[serde(rename = "IsMirroredInX")]
    pub mirror_x: bool,
    #[serde(rename = "IsMirroredInY")]
    pub mirror_y: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Solid {
    pub layer: String,
    pub vertices: [Vector3; 4],
}

/// 带 `Type` 判别字段的图元联合体，用于多态数组的序列化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum DrawingObject {
    #[serde(rename = "PolylineData")]
    Polyline(Polyline),
    #[serde(rename = "LineData")]
    Line(Line),
    #[serde(rename = "ArcData")]
    Arc(Arc),
    #[serde(rename = "CircleData")]
    Circle(Circle),
    #[serde(rename = "EllipseData")]
    Ellipse(Ellipse),
    #[serde(rename = "MTextData")]
    RichText(RichText),
    #[serde(rename = "TextData")]
    PlainText(PlainText),
    #[serde(rename = "SolidData")]
    Solid(Solid),
}

impl DrawingObject {
    pub fn layer_name(&self) -> &str {
        match self {
            DrawingObject::Polyline(polyline) => &polyline.layer,
            DrawingObject::Line(line) => &line.layer,
            DrawingObject::Arc(arc) => &arc.layer,
            DrawingObject::Circle(circle) => &circle.layer,
            DrawingObject::Ellipse(ellipse) => &ellipse.layer,
            DrawingObject::RichText(text) => &text.layer,
            DrawingObject::PlainText(text) => &text.layer,
            DrawingObject::Solid(solid) => &solid.layer,
        }
    }

    /// 序列化判别名，也用于日志。
    pub fn kind_name(&self) -> &'static str {
        match self {
            DrawingObject::Polyline(_) => "PolylineData",
            DrawingObject::Line(_) => "LineData",
            DrawingObject::Arc(_) => "ArcData",
            DrawingObject::Circle(_) => "CircleData",
            DrawingObject::Ellipse(_) => "EllipseData",
            DrawingObject::RichText(_) => "MTextData",
            DrawingObject::PlainText(_) => "TextData",
            DrawingObject::Solid(_) => "SolidData",
        }
    }

    /// 粗略包围盒：圆类图元按整圆估算，文字只计插入点。
    pub fn bounds(&self) -> Option<Bounds2D> {
        let mut bounds = Bounds2D::empty();
        let mut include = |point: Vector3| bounds.include_point(point.to_point2());
        match self {
            DrawingObject::Polyline(polyline) => polyline.vertices.iter().copied().for_each(include),
            DrawingObject::Line(line) => {
                include(line.start);
                include(line.end);
            }
            DrawingObject::Arc(Arc { center, radius, .. })
            | DrawingObject::Circle(Circle { center, radius, .. }) => {
                let r = radius.abs();
                include(Vector3::xy(center.x() - r, center.y() - r));
                include(Vector3::xy(center.x() + r, center.y() + r));
            }
            DrawingObject::Ellipse(ellipse) => {
                let r = ellipse.major_radius.abs();
                let c = ellipse.center;
                include(Vector3::xy(c.x() - r, c.y() - r));
                include(Vector3::xy(c.x() + r, c.y() + r));
            }
            DrawingObject::RichText(text) => include(text.location),
            DrawingObject::PlainText(text) => include(text.location),
            DrawingObject::Solid(solid) => solid.vertices.iter().copied().for_each(include),
        }
        if bounds.is_empty() { None } else { Some(bounds) }
    }
}

macro_rules! impl_from_variant {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for DrawingObject {
                fn from(value: $ty) -> Self {
                    DrawingObject::$ty(value)
                }
            }
        )*
    };
}

impl_from_variant!(Polyline, Line, Arc, Circle, Ellipse, RichText, PlainText, Solid);

/// 按图元类别分组的有序集合，即模板文件与报表输出的共同载体。
///
/// 每个分组内的插入顺序有意义：文字行的顺序直接对应纵向排布。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DrawingObjectSet {
    pub polylines: Vec<Polyline>,
    pub lines: Vec<Line>,
    pub arcs: Vec<Arc>,
    pub circles: Vec<Circle>,
    pub ellipses: Vec<Ellipse>,
    #[serde(rename = "MTexts")]
    pub rich_texts: Vec<RichText>,
    #[serde(rename = "Texts")]
    pub plain_texts: Vec<PlainText>,
    pub solids: Vec<Solid>,
    #[serde(rename = "NumberOfRows")]
    pub row_count: u32,
}

impl DrawingObjectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_objects<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = DrawingObject>,
    {
        let mut set = Self::new();
        for object in objects {
            set.push(object);
        }
        set
    }

    pub fn push(&mut self, object: impl Into<DrawingObject>) {
        match object.into() {
            DrawingObject::Polyline(polyline) => self.polylines.push(polyline),
            DrawingObject::Line(line) => self.lines.push(line),
            DrawingObject::Arc(arc) => self.arcs.push(arc),
            DrawingObject::Circle(circle) => self.circles.push(circle),
            DrawingObject::Ellipse(ellipse) => self.ellipses.push(ellipse),
            DrawingObject::RichText(text) => self.rich_texts.push(text),
            DrawingObject::PlainText(text) => self.plain_texts.push(text),
            DrawingObject::Solid(solid) => self.solids.push(solid),
        }
    }

    /// 追加另一集合的全部图元，`row_count` 保持不变。
    pub fn extend(&mut self, other: DrawingObjectSet) {
        self.polylines.extend(other.polylines);
        self.lines.extend(other.lines);
        self.arcs.extend(other.arcs);
        self.circles.extend(other.circles);
        self.ellipses.extend(other.ellipses);
        self.rich_texts.extend(other.rich_texts);
        self.plain_texts.extend(other.plain_texts);
        self.solids.extend(other.solids);
    }

    /// 以宿主创建顺序（多段线、直线、圆弧、圆、椭圆、多行文字、单行文字、填充）展开。
    pub fn objects(&self) -> Vec<DrawingObject> {
        let mut objects = Vec::with_capacity(self.len());
        objects.extend(self.polylines.iter().cloned().map(DrawingObject::Polyline));
        objects.extend(self.lines.iter().cloned().map(DrawingObject::Line));
        objects.extend(self.arcs.iter().cloned().map(DrawingObject::Arc));
        objects.extend(self.circles.iter().cloned().map(DrawingObject::Circle));
        objects.extend(self.ellipses.iter().cloned().map(DrawingObject::Ellipse));
        objects.extend(self.rich_texts.iter().cloned().map(DrawingObject::RichText));
        objects.extend(self.plain_texts.iter().cloned().map(DrawingObject::PlainText));
        objects.extend(self.solids.iter().cloned().map(DrawingObject::Solid));
        objects
    }

    pub fn len(&self) -> usize {
        self.polylines.len()
            + self.lines.len()
            + self.arcs.len()
            + self.circles.len()
            + self.ellipses.len()
            + self.rich_texts.len()
            + self.plain_texts.len()
            + self.solids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 查找第一个内容包含 `marker` 的多行文字。
    pub fn rich_text_containing(&self, marker: &str) -> Option<&RichText> {
        self.rich_texts
            .iter()
            .find(|text| text.contents.contains(marker))
    }

    pub fn rich_text_containing_mut(&mut self, marker: &str) -> Option<&mut RichText> {
        self.rich_texts
            .iter_mut()
            .find(|text| text.contents.contains(marker))
    }

    pub fn bounds(&self) -> Option<Bounds2D> {
        let mut bounds = Bounds2D::empty();
        let mut has = false;
        for object in self.objects() {
            if let Some(object_bounds) = object.bounds() {
                bounds.include_bounds(&object_bounds);
                has = true;
            }
        }
        if has { Some(bounds) } else { None }
    }
}
