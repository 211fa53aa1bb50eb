//! Printable catalog page. Plain server-rendered HTML, one section per
//! category with a jump list on top.
//!
//! Attribute values are always double-quoted, so the minimal entity set is
//! enough for them too.

use htmlescape::encode_minimal as escape_html;

use crate::catalog::{price_tag, CategoryGroup, Product};

const CONTACT_URL: &str = "https://wa.me/5551992476399?text=Ol%C3%A1%20Realizhe!%20Cheguei%20pelo%20menu%20online%20e%20quero%20saber%20mais%20sobre%20os%20boxes.";

const STYLE: &str = "body{font-family:sans-serif;margin:0;background:#f6f4ef;color:#1d1d1b}\
.sheet{max-width:960px;margin:0 auto;padding:32px}\
nav a{margin-right:12px}\
.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(260px,1fr));gap:16px}\
.card{background:#fff;border-radius:12px;padding:16px}\
.card img{width:100%;height:160px;object-fit:cover;border-radius:8px}\
.price{font-weight:bold}\
@media print{nav,.cta{display:none}}";

pub fn render_catalog_page(groups: &[CategoryGroup]) -> String {
    let nav = groups
        .iter()
        .map(|group| {
            format!(
                "<a href=\"#{}\">{}</a>",
                escape_html(&group.anchor),
                escape_html(&group.label)
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let sections = if groups.is_empty() {
        String::from("<p class=\"empty\">Nenhum produto disponível no momento.</p>")
    } else {
        groups.iter().map(render_group).collect::<Vec<_>>().join("\n")
    };

    format!(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\" />\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n\
<title>Cardápio Realizhe Real Food</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
<div class=\"sheet\">\n<header>\n<p>Catálogo</p>\n<h1>Cardápio Realizhe Real Food</h1>\n\
<p>Catálogo digital para consulta rápida do cardápio. Valores e disponibilidade podem variar conforme a semana de produção.</p>\n\
<p class=\"cta\"><a href=\"{contact}\" target=\"_blank\" rel=\"noopener noreferrer\">Falar no WhatsApp</a></p>\n\
</header>\n<nav>{nav}</nav>\n{sections}\n</div>\n</body>\n</html>\n",
        contact = escape_html(CONTACT_URL),
    )
}

fn render_group(group: &CategoryGroup) -> String {
    let cards = group
        .products
        .iter()
        .map(render_product)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<section id=\"{anchor}\">\n<h2>{label}</h2>\n<div class=\"grid\">\n{cards}\n</div>\n</section>",
        anchor = escape_html(&group.anchor),
        label = escape_html(&group.label),
    )
}

fn render_product(product: &Product) -> String {
    let highlights = if product.highlights.is_empty() {
        String::new()
    } else {
        let items = product
            .highlights
            .iter()
            .map(|item| format!("<li>{}</li>", escape_html(item)))
            .collect::<String>();
        format!("<ul>{items}</ul>")
    };
    format!(
        "<article class=\"card\">\n<img src=\"{src}\" alt=\"{alt}\" loading=\"lazy\" />\n\
<h3>{name}</h3>\n<p>{description}</p>\n{highlights}<p class=\"price\">{price}</p>\n</article>",
        src = escape_html(&product.image_url),
        alt = escape_html(&product.name),
        name = escape_html(&product.name),
        description = escape_html(&product.description),
        price = escape_html(&price_tag(product.price)),
    )
}

#[cfg(test)]
mod tests {
    use super::render_catalog_page;
    use crate::catalog::{group_by_category, Product};

    fn product(name: &str, category: Option<&str>, price: f64) -> Product {
        Product {
            id: name.to_string(),
            slug: name.to_string(),
            name: name.to_string(),
            description: String::from("Arroz & feijão"),
            price,
            image_url: String::from("/images/placeholder.png"),
            image_path: None,
            category: category.map(String::from),
            highlights: vec![String::from("<sem glúten>")],
            is_active: true,
        }
    }

    #[test]
    fn renders_sections_with_anchors_and_escaped_text() {
        let groups = group_by_category(vec![
            product("Frango", Some("lowcarb"), 29.9),
            product("Bolo", None, 0.0),
        ]);
        let html = render_catalog_page(&groups);
        assert!(html.contains("<section id=\"categoria-lowcarb\">"));
        assert!(html.contains("<a href=\"#categoria-lowcarb\">Low Carb</a>"));
        assert!(html.contains("src=\"/images/placeholder.png\""));
        assert!(html.contains("href=\"https://wa.me/5551992476399?text="));
        assert!(html.contains("<h2>Low Carb</h2>"));
        assert!(html.contains("<section id=\"categoria-outros\">"));
        assert!(html.contains("R$ 29.90"));
        assert!(html.contains("Sob consulta"));
        assert!(html.contains("Arroz &amp; feijão"));
        assert!(html.contains("&lt;sem glúten&gt;"));
    }

    #[test]
    fn empty_catalog_has_notice() {
        let html = render_catalog_page(&[]);
        assert!(html.contains("Nenhum produto disponível"));
    }
}
