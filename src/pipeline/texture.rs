use super::types::SoilTypeLabel;

/// Maps clay/sand/silt percentages to a soil-type label.
///
/// Any missing fraction gives `Unknown`. A hint other than `"Unknown"` wins
/// next (an unrecognised hint also gives `Unknown`). Otherwise the first
/// matching rule applies:
///
/// | # | Rule                                          | Label   |
/// |---|-----------------------------------------------|---------|
/// | 1 | clay > 40                                     | Clay    |
/// | 2 | sand > 70                                     | Sandy   |
/// | 3 | silt > 40                                     | Silty   |
/// | 4 | 20 < clay ≤ 40, 20 < sand ≤ 70, 20 < silt ≤ 70 | Loamy   |
/// | 5 | clay > 20, sand < 20, silt < 20               | Black   |
/// | 6 | sand > 60, clay < 10                          | Red     |
/// | 7 | silt > 50, clay < 10, sand < 20               | Peaty   |
/// | 8 | sand > 20, silt > 20, clay < 10               | Saline  |
/// | 9 | otherwise                                     | Unknown |
pub fn classify(
    clay: Option<f64>,
    sand: Option<f64>,
    silt: Option<f64>,
    hint: Option<&str>,
) -> SoilTypeLabel {
    let (Some(clay), Some(sand), Some(silt)) = (clay, sand, silt) else {
        return SoilTypeLabel::Unknown;
    };

    if let Some(hint) = hint.map(str::trim).filter(|h| !h.eq_ignore_ascii_case("unknown")) {
        return SoilTypeLabel::from_name(hint).unwrap_or(SoilTypeLabel::Unknown);
    }

    cascade(clay, sand, silt)
}

fn cascade(clay: f64, sand: f64, silt: f64) -> SoilTypeLabel {
    match (clay, sand, silt) {
        (c, _, _) if c > 40.0 => SoilTypeLabel::Clay,
        (_, s, _) if s > 70.0 => SoilTypeLabel::Sandy,
        (_, _, t) if t > 40.0 => SoilTypeLabel::Silty,
        (c, s, t)
            if c > 20.0 && c <= 40.0 && s > 20.0 && s <= 70.0 && t > 20.0 && t <= 70.0 =>
        {
            SoilTypeLabel::Loamy
        }
        (c, s, t) if c > 20.0 && s < 20.0 && t < 20.0 => SoilTypeLabel::Black,
        (c, s, _) if s > 60.0 && c < 10.0 => SoilTypeLabel::Red,
        (c, s, t) if t > 50.0 && c < 10.0 && s < 20.0 => SoilTypeLabel::Peaty,
        (c, s, t) if s > 20.0 && t > 20.0 && c < 10.0 => SoilTypeLabel::Saline,
        _ => SoilTypeLabel::Unknown,
    }
}
