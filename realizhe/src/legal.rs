//! Terms of supply and privacy policy, with a content hash recorded on every
//! acceptance so the exact accepted text can be identified later.

use serde::Serialize;
use sha2::{Digest, Sha256};

pub const TERMS_VERSION: &str = "1.2";

pub const TERMS_TEXT: &str = "REALIZHE REAL FOOD - TERMOS DE FORNECIMENTO

1. Disposições Gerais
1.1 Estes Termos regem a comercialização dos produtos Realizhe Real Food.
1.2 O consumo das refeições deve considerar restrições individuais. Em caso de dúvida, consulte profissional de saúde.

2. Pedidos e Entregas
2.1 Os pedidos são preparados mediante agendamento semanal.
2.2 Entregas realizadas em Porto Alegre/RS e região metropolitana mediante taxa previamente informada.

3. Armazenamento e Consumo
3.1 Manter as refeições refrigeradas (até 4°C) por até 3 dias ou congeladas (-18°C) por até 90 dias.
3.2 Recomendamos aquecimento em micro-ondas ou banho-maria até atingir 74°C.

4. Política de Cancelamento
4.1 Cancelamentos até 48h antes da produção garantem reembolso integral.
4.2 Cancelamentos após esse prazo geram crédito para pedidos futuros.

5. LGPD
5.1 Dados pessoais são utilizados para emissão de notas, logística e relacionamento.
5.2 O cliente pode solicitar revisão ou exclusão de dados pelo canal oficial.

6. Foro
6.1 Fica eleito o foro da Comarca de Porto Alegre/RS.";

pub const PRIVACY_TEXT: &str = "POLÍTICA DE PRIVACIDADE - REALIZHE REAL FOOD

1. Controladora
Realizhe Real Food, CNPJ 29.255.549/0001-09.

2. Dados Coletados
Nome, telefone, e-mail, CPF, endereço, preferências alimentares e registros de aceite.

3. Finalidade
Gestão de pedidos, atendimento ao cliente, comunicações transacionais e emissões fiscais.

4. Compartilhamento
Dados são compartilhados apenas com serviços essenciais (processadores de pagamento, logística e Supabase).

5. Direitos do Titular
Solicitar acesso, correções, portabilidade ou exclusão via WhatsApp (51) 99247-6399.

6. Retenção
Dados sobre transações são mantidos pelo período legal mínimo de 5 anos.

7. Contato
Canal oficial: atendimento@realizhe.com.br";

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermsSnapshot {
    pub version: &'static str,
    pub hash: String,
    pub text: &'static str,
}

impl TermsSnapshot {
    pub fn current() -> Self {
        Self {
            version: TERMS_VERSION,
            hash: content_hash(TERMS_TEXT),
            text: TERMS_TEXT,
        }
    }

    /// Value stored in `clientes.hash_termos`.
    pub fn customer_marker(&self) -> String {
        format!("{}:{}", self.version, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::{content_hash, TermsSnapshot, TERMS_TEXT};

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash(TERMS_TEXT).len(), 64);
    }

    #[test]
    fn snapshot_marker_joins_version_and_hash() {
        let snapshot = TermsSnapshot::current();
        assert_eq!(snapshot.version, "1.2");
        assert_eq!(
            snapshot.customer_marker(),
            format!("1.2:{}", content_hash(TERMS_TEXT))
        );
        assert!(!snapshot.text.starts_with(char::is_whitespace));
    }
}
