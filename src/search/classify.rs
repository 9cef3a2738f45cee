//! Lexical query classification.
//!
//! Decides which collaborator sources are worth asking for a given query.

use regex::Regex;
use std::sync::LazyLock;

use super::catalog::SourceKind;

static PRODUCT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^prd\d*$").expect("static regex"));
static INGREDIENT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6,}$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    /// `PRD` followed by digits only.
    ProductCode,
    /// Long run of digits, shaped like an ingredient barcode.
    IngredientCode,
    /// No digits at all.
    Name,
    /// Mixed or short numeric input; could be either.
    Ambiguous,
}

impl QueryClass {
    pub fn of(query: &str) -> Self {
        let q = query.trim();
        if PRODUCT_CODE.is_match(q) {
            Self::ProductCode
        } else if INGREDIENT_CODE.is_match(q) {
            Self::IngredientCode
        } else if !q.chars().any(|c| c.is_ascii_digit()) {
            Self::Name
        } else {
            Self::Ambiguous
        }
    }

    pub fn is_barcode(self) -> bool {
        matches!(self, Self::ProductCode | Self::IngredientCode)
    }

    /// Sources to query for this class.
    pub fn sources(self) -> &'static [SourceKind] {
        match self {
            // Product codes never occur on ingredients, so no product can
            // contain a matching ingredient.
            Self::ProductCode => &[SourceKind::NameOrCode],
            Self::IngredientCode | Self::Name | Self::Ambiguous => {
                &[SourceKind::NameOrCode, SourceKind::CrossEntity]
            }
        }
    }
}
