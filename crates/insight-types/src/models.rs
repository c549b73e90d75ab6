use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The slot a dataset column fills on a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisRole {
    X,
    Y,
    Category,
    Series,
}

impl AxisRole {
    pub const ALL: [AxisRole; 4] = [Self::X, Self::Y, Self::Category, Self::Series];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Category => "category",
            Self::Series => "series",
        }
    }

    /// Name of the form field carrying this role's column letter.
    pub fn form_field(self) -> &'static str {
        match self {
            Self::X => "x_axis",
            Self::Y => "y_axis",
            Self::Category => "category",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for AxisRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAxisRole(pub String);

impl fmt::Display for UnknownAxisRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown axis role: {}", self.0)
    }
}

impl std::error::Error for UnknownAxisRole {}

impl FromStr for AxisRole {
    type Err = UnknownAxisRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownAxisRole(s.to_string()))
    }
}

/// Chart type names seeded into the `chart_types` table.
pub const BAR_CHART: &str = "Bar Chart";
pub const LINE_CHART: &str = "Line Chart";

/// Client-side renderer for a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    Bar,
    Line,
}

impl Renderer {
    /// Maps a stored chart type name to its renderer. Unknown or missing
    /// names render as bars.
    pub fn for_chart_type(name: Option<&str>) -> Self {
        match name {
            Some(LINE_CHART) => Self::Line,
            _ => Self::Bar,
        }
    }
}

/// Dashboard visibility as submitted by the dashboard form.
///
/// The form encodes Private as `"True"` and Public as `"False"`, mirroring the
/// stored `is_private` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn from_form(value: &str) -> Option<Self> {
        match value {
            "True" | "true" => Some(Self::Private),
            "False" | "false" => Some(Self::Public),
            _ => None,
        }
    }

    pub fn from_private_flag(is_private: bool) -> Self {
        if is_private { Self::Private } else { Self::Public }
    }

    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }
}
