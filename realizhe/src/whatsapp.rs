//! Outbound WhatsApp messages summarising a submission. The text is built
//! deterministically from the request and URI-component encoded for a
//! `wa.me` link.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone)]
pub struct MessageContact<'a> {
    pub customer_name: &'a str,
    pub address: &'a str,
    pub city: Option<&'a str>,
    pub phone: &'a str,
    pub payment: &'a str,
    pub total: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MessageItem<'a> {
    pub name: &'a str,
    pub quantity: u32,
}

pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

pub fn encode_component(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

pub fn whatsapp_url(number: &str, encoded_text: &str) -> String {
    format!("https://wa.me/{number}?text={encoded_text}")
}

fn contact_lines(contact: &MessageContact<'_>) -> [String; 3] {
    let city = contact
        .city
        .filter(|city| !city.is_empty())
        .map(|city| format!(" - {city}"))
        .unwrap_or_default();
    [
        format!("Nome: {}", contact.customer_name),
        format!("Telefone: {}", contact.phone),
        format!("Endereco: {}{city}", contact.address),
    ]
}

pub fn build_standard_order_message(
    contact: &MessageContact<'_>,
    items: &[MessageItem<'_>],
) -> String {
    let mut lines = vec![String::from("NOVO PEDIDO - REALIZHE REAL FOOD")];
    lines.extend(contact_lines(contact));
    lines.push(String::new());
    lines.push(String::from("Pedido:"));
    lines.extend(
        items
            .iter()
            .map(|item| format!("- {}x {}", item.quantity, item.name)),
    );
    if let Some(total) = contact.total {
        lines.push(String::new());
        lines.push(format!("Valor estimado: R$ {total:.2}"));
    }
    lines.push(format!("Forma de pagamento: {}", contact.payment));
    encode_component(&lines.join("\n"))
}

pub fn build_custom_plan_message(
    contact: &MessageContact<'_>,
    summary: &str,
    attachment_url: Option<&str>,
) -> String {
    let mut lines = vec![String::from("NOVO PLANO PERSONALIZADO - REALIZHE REAL FOOD")];
    lines.extend(contact_lines(contact));
    lines.push(String::new());
    lines.push(String::from("Resumo:"));
    lines.push(summary.to_string());
    lines.push(String::new());
    lines.push(format!("Forma de pagamento sugerida: {}", contact.payment));
    if let Some(url) = attachment_url.filter(|url| !url.is_empty()) {
        lines.push(String::new());
        lines.push(format!("Arquivo enviado: {url}"));
    }
    encode_component(&lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use percent_encoding::percent_decode_str;

    use super::*;

    fn contact(total: Option<f64>, city: Option<&'static str>) -> MessageContact<'static> {
        MessageContact {
            customer_name: "Ana Souza",
            address: "Rua A, 10",
            city,
            phone: "51999990000",
            payment: "Pix",
            total,
        }
    }

    fn decode(encoded: &str) -> String {
        percent_decode_str(encoded)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn normalize_phone_keeps_digits() {
        assert_eq!(normalize_phone("(51) 99999-0000"), "51999990000");
        assert_eq!(normalize_phone("+55 51 9"), "55519");
    }

    #[test]
    fn encoding_matches_uri_component() {
        assert_eq!(encode_component("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
        assert_eq!(encode_component("ção\n"), "%C3%A7%C3%A3o%0A");
    }

    #[test]
    fn standard_order_message_layout() {
        let encoded = build_standard_order_message(
            &contact(Some(89.7), Some("Porto Alegre")),
            &[
                MessageItem {
                    name: "Frango",
                    quantity: 2,
                },
                MessageItem {
                    name: "Escondidinho",
                    quantity: 1,
                },
            ],
        );
        assert_eq!(
            decode(&encoded),
            "NOVO PEDIDO - REALIZHE REAL FOOD\n\
             Nome: Ana Souza\n\
             Telefone: 51999990000\n\
             Endereco: Rua A, 10 - Porto Alegre\n\
             \n\
             Pedido:\n\
             - 2x Frango\n\
             - 1x Escondidinho\n\
             \n\
             Valor estimado: R$ 89.70\n\
             Forma de pagamento: Pix"
        );
    }

    #[test]
    fn standard_order_message_without_total_or_city() {
        let decoded = decode(&build_standard_order_message(
            &contact(None, None),
            &[MessageItem {
                name: "Frango",
                quantity: 1,
            }],
        ));
        assert!(decoded.contains("Endereco: Rua A, 10\n"));
        assert!(!decoded.contains("Valor estimado"));
        assert!(decoded.ends_with("- 1x Frango\nForma de pagamento: Pix"));
    }

    #[test]
    fn custom_plan_message_with_attachment() {
        let decoded = decode(&build_custom_plan_message(
            &contact(None, Some("Canoas")),
            "Frequencia: semanal\nObjetivos: ganho de massa",
            Some("https://files/plan.pdf"),
        ));
        assert_eq!(
            decoded,
            "NOVO PLANO PERSONALIZADO - REALIZHE REAL FOOD\n\
             Nome: Ana Souza\n\
             Telefone: 51999990000\n\
             Endereco: Rua A, 10 - Canoas\n\
             \n\
             Resumo:\n\
             Frequencia: semanal\n\
             Objetivos: ganho de massa\n\
             \n\
             Forma de pagamento sugerida: Pix\n\
             \n\
             Arquivo enviado: https://files/plan.pdf"
        );
    }

    #[test]
    fn url_targets_number() {
        assert_eq!(
            whatsapp_url("5551982895068", "oi"),
            "https://wa.me/5551982895068?text=oi"
        );
    }
}
