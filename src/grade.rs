//! Letter grades derived from a GPA on the 4.0 scale.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    D,
    F,
}

/// Descending lower bounds; the first one the GPA reaches wins.
const THRESHOLDS: [(f32, Grade); 9] = [
    (4.00, Grade::APlus),
    (3.75, Grade::A),
    (3.50, Grade::AMinus),
    (3.25, Grade::BPlus),
    (3.00, Grade::B),
    (2.75, Grade::BMinus),
    (2.50, Grade::CPlus),
    (2.25, Grade::C),
    (2.00, Grade::D),
];

impl Grade {
    /// Map a GPA to its grade after clamping it to `[0.0, 4.0]`. NaN counts as
    /// zero.
    pub fn from_gpa(gpa: f32) -> Self {
        let gpa = if gpa.is_nan() { 0.0 } else { gpa.clamp(0.0, 4.0) };
        THRESHOLDS
            .iter()
            .find(|(floor, _)| gpa >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        THRESHOLDS
            .iter()
            .map(|(_, grade)| *grade)
            .chain(std::iter::once(Grade::F))
            .find(|grade| grade.as_str() == s)
            .ok_or_else(|| format!("unknown grade {s:?}"))
    }
}
