use serde::{de::Error, Deserialize, Serialize};

use imageproc::rect::Rect;

/// A nominal pixel coordinate on the page, `(x, y)`.
pub type Coord = (i32, i32);

/// A rectangle in page pixel coordinates. Serialized as
/// `[left, upper, right, lower]` with `right` and `lower` exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeaderRect {
    pub left: u32,
    pub upper: u32,
    pub right: u32,
    pub lower: u32,
}

impl HeaderRect {
    pub fn new(left: u32, upper: u32, right: u32, lower: u32) -> Self {
        Self {
            left,
            upper,
            right,
            lower,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.lower.saturating_sub(self.upper)
    }

    /// Whether the rectangle is non-empty and lies within an image of the
    /// given dimensions.
    pub fn fits_within(&self, (width, height): (u32, u32)) -> bool {
        self.width() > 0 && self.height() > 0 && self.right <= width && self.lower <= height
    }

    pub fn to_rect(&self) -> Rect {
        Rect::at(self.left as i32, self.upper as i32).of_size(self.width().max(1), self.height().max(1))
    }
}

impl<'de> Deserialize<'de> for HeaderRect {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let [left, upper, right, lower] = <[u32; 4]>::deserialize(deserializer)?;
        if right <= left || lower <= upper {
            return Err(D::Error::custom(format!(
                "header rectangle [{}, {}, {}, {}] is empty",
                left, upper, right, lower
            )));
        }
        Ok(HeaderRect::new(left, upper, right, lower))
    }
}

impl Serialize for HeaderRect {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        [self.left, self.upper, self.right, self.lower].serialize(serializer)
    }
}

/// Global shift applied to every nominal checkbox coordinate, `[x, y]` in JSON.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub fn apply(&self, (x, y): Coord) -> Coord {
        (x + self.x, y + self.y)
    }
}

impl<'de> Deserialize<'de> for Offset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (x, y) = <(i32, i32)>::deserialize(deserializer)?;
        Ok(Offset { x, y })
    }
}

impl Serialize for Offset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (self.x, self.y).serialize(serializer)
    }
}

/// Strategy used to estimate the skew of a scanned page from its header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RotationMethod {
    /// Dominant eigenvector of the header's ink point cloud.
    PrincipalAxis,
    /// Slope of the header's top edge between its two upper corners.
    #[default]
    EdgeFit,
}

impl TryFrom<&str> for RotationMethod {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "principal-axis" => Ok(RotationMethod::PrincipalAxis),
            "edge-fit" => Ok(RotationMethod::EdgeFit),
            _ => Err(format!("invalid rotation method: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for RotationMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RotationMethod::try_from(s.as_str()).map_err(D::Error::custom)
    }
}

impl Serialize for RotationMethod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            RotationMethod::PrincipalAxis => serializer.serialize_str("principal-axis"),
            RotationMethod::EdgeFit => serializer.serialize_str("edge-fit"),
        }
    }
}
