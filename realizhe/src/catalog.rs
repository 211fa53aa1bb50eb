//! Catalog: storefront products mapped from `produtos` rows, category labels
//! and grouping for the menu and the printable catalog.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::backend::ProductRow;

pub const PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";
pub const UNCATEGORIZED: &str = "Outros";

/// Storefront menu labels.
const LINE_LABELS: &[(&str, &str)] = &[
    ("equilibrio", "Linha Equilibrio"),
    ("gourmet", "Linha Gourmet"),
    ("lowcarb", "Linha Performance"),
    ("bemestar", "Linha Bem-estar"),
    ("comfort", "Linha Comfort"),
    ("lanches", "Linha Lanches"),
];

/// Printable catalog labels.
const SHORT_LABELS: &[(&str, &str)] = &[
    ("equilibrio", "Equilíbrio"),
    ("gourmet", "Gourmet"),
    ("lowcarb", "Low Carb"),
    ("bemestar", "Bem-estar"),
    ("comfort", "Comfort"),
    ("lanches", "Lanches"),
];

static CAMEL_BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-z])([A-Z])")
        .unwrap_or_else(|e| panic!("camel boundary regex must be valid: {e}"))
});

static NON_ALNUM_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9]+").unwrap_or_else(|e| panic!("anchor regex must be valid: {e}"))
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
    pub image_path: Option<String>,
    pub category: Option<String>,
    pub highlights: Vec<String>,
    pub is_active: bool,
}

impl Product {
    pub fn from_row(row: ProductRow, storage_base: Option<&str>) -> Self {
        let image_url = resolve_image_url(row.imagem_path.as_deref(), storage_base);
        Self {
            id: row.id,
            slug: row.slug,
            name: row.nome,
            description: row.descricao.unwrap_or_default(),
            price: row.preco.unwrap_or(0.0),
            image_url,
            image_path: row.imagem_path,
            category: row.categoria,
            highlights: row.destaques.unwrap_or_default(),
            is_active: row.ativo.unwrap_or(true),
        }
    }
}

pub fn map_products(rows: Vec<ProductRow>, storage_base: Option<&str>) -> Vec<Product> {
    rows.into_iter()
        .map(|row| Product::from_row(row, storage_base))
        .collect()
}

/// Absolute or root-relative paths pass through; bucket-relative paths are
/// joined onto the storage base.
pub fn resolve_image_url(path: Option<&str>, storage_base: Option<&str>) -> String {
    let path = path.unwrap_or_default();
    if path.is_empty() {
        return String::from(PLACEHOLDER_IMAGE);
    }
    if path.starts_with("http") || path.starts_with('/') {
        return path.to_string();
    }
    match storage_base.filter(|base| !base.is_empty()) {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
        None => String::from(PLACEHOLDER_IMAGE),
    }
}

pub fn category_label(category: Option<&str>) -> String {
    let Some(category) = category.filter(|c| !c.is_empty()) else {
        return String::from(UNCATEGORIZED);
    };
    LINE_LABELS
        .iter()
        .find(|(key, _)| *key == category)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| category.to_string())
}

pub fn normalize_category(category: Option<&str>) -> String {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_string()
}

/// Human label for a raw category key: known keys get their short name,
/// anything else is split on `-`, `_` and camelCase and title-cased.
pub fn format_category(label: &str) -> String {
    let key = label.to_lowercase();
    if let Some((_, known)) = SHORT_LABELS.iter().find(|(k, _)| *k == key) {
        return (*known).to_string();
    }

    let spaced = label.replace(['-', '_'], " ");
    let spaced = CAMEL_BOUNDARY_RE.replace_all(&spaced, "$1 $2");
    spaced
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let rest = chars.as_str().to_lowercase();
            first.to_uppercase().chain(rest.chars()).collect()
        }
        None => String::new(),
    }
}

/// DOM anchor for a category section, e.g. `categoria-bem-estar`.
pub fn anchor_id(category: &str) -> String {
    let folded = fold_accents(&normalize_category(Some(category)).to_lowercase());
    let slug = NON_ALNUM_RUN_RE.replace_all(&folded, "-");
    format!("categoria-{}", slug.trim_matches('-'))
}

/// Decompose and drop combining marks (U+0300..=U+036F).
fn fold_accents(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !('\u{300}'..='\u{36f}').contains(c))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub key: String,
    pub label: String,
    /// Storefront menu name, e.g. "Linha Performance".
    pub menu_label: String,
    pub anchor: String,
    pub products: Vec<Product>,
}

/// Group by normalized category. Categories keep the order in which they
/// first appear; products keep input order.
pub fn group_by_category(products: Vec<Product>) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for product in products {
        let key = normalize_category(product.category.as_deref());
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.products.push(product),
            None => groups.push(CategoryGroup {
                label: format_category(&key),
                menu_label: category_label(Some(&key)),
                anchor: anchor_id(&key),
                key,
                products: vec![product],
            }),
        }
    }
    groups
}

/// Distinct normalized categories in first-appearance order.
pub fn available_categories(products: &[Product]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for product in products {
        let key = normalize_category(product.category.as_deref());
        if !seen.contains(&key) {
            seen.push(key);
        }
    }
    seen
}

pub fn price_tag(price: f64) -> String {
    if price > 0.0 {
        format!("R$ {price:.2}")
    } else {
        String::from("Sob consulta")
    }
}
