//! Static merchandising tables.

use crate::domain::customer::Segment;

/// Categories each segment is steered towards, most relevant first.
pub fn preferred_categories(segment: Segment) -> &'static [&'static str] {
    match segment {
        Segment::Vip => &["Proteína", "Pre-Entreno", "Creatina", "Aminoácidos"],
        Segment::Frecuente => &["Proteína", "Creatina", "Vitaminas"],
        Segment::Ocasional => &["Proteína", "Vitaminas", "Snacks"],
        Segment::Nuevo => &["Proteína", "Vitaminas", "Accesorios"],
        Segment::EnRiesgo => &["Snacks", "Vitaminas", "Proteína"],
        Segment::Inactivo => &["Proteína", "Snacks"],
    }
}

/// Categories that pair well with `category`. Unknown categories have none.
pub fn complementary_categories(category: &str) -> &'static [&'static str] {
    match category {
        "Proteína" => &["Creatina", "Aminoácidos", "Accesorios"],
        "Pre-Entreno" => &["Aminoácidos", "Creatina"],
        "Creatina" => &["Proteína", "Pre-Entreno"],
        "Aminoácidos" => &["Proteína", "Pre-Entreno"],
        "Vitaminas" => &["Proteína", "Snacks"],
        "Quemadores" => &["Aminoácidos", "Vitaminas"],
        "Snacks" => &["Proteína", "Vitaminas"],
        "Accesorios" => &["Proteína", "Pre-Entreno"],
        _ => &[],
    }
}
