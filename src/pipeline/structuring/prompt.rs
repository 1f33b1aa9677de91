use super::fields::{FieldCatalogue, FieldKind};

const ROLE: &str = "Você é um engenheiro revisor da CAIXA. Leia os documentos abaixo \
(LAUDO, PLS e ALVARÁ, separados por linhas --- NOME ---) e gere um único objeto JSON estrito.";

const GLOBAL_RULES: &str = r#"REGRAS:
1. Responda somente com um objeto JSON, sem texto antes ou depois e sem comentários.
2. Use exatamente os nomes de campo listados; não crie campos novos.
3. Valores monetários podem aparecer como texto livre perto de rótulos como "valor de mercado", "valor global" ou "valor total do imóvel". Copie o valor como aparece no documento.
4. Coordenadas geográficas devem estar em graus, minutos e segundos (GMS), sem letras cardeais (N, S, L, O, E, W).
5. Datas no formato DD/MM/AAAA.
6. Listas de números seguem a ordem em que aparecem nas tabelas.
7. Se um valor não existir nos documentos, use "" para texto e número e [] para listas. Nunca invente valores."#;

/// Build the fixed instruction from the declared field catalogue.
pub fn build_instruction(catalogue: &FieldCatalogue) -> String {
    let mut out = String::with_capacity(1024 + catalogue.len() * 80);
    out.push_str(ROLE);
    out.push_str("\n\nCAMPOS:\n");

    for field in catalogue.iter() {
        out.push_str("- ");
        out.push_str(&field.name);
        out.push_str(" (");
        out.push_str(field.kind.describe());
        out.push(')');
        if !field.hint.trim().is_empty() {
            out.push_str(": ");
            out.push_str(field.hint.trim());
        }
        out.push('\n');
    }

    out.push('\n');
    out.push_str(GLOBAL_RULES);
    out.push_str("\n\nFORMATO:\n");
    out.push_str(&response_skeleton(catalogue));
    out
}

/// Example JSON object with every declared key and its empty value.
fn response_skeleton(catalogue: &FieldCatalogue) -> String {
    let entries: Vec<String> = catalogue
        .iter()
        .map(|f| {
            let empty = match f.kind {
                FieldKind::List => "[]",
                FieldKind::Text | FieldKind::Number => "\"\"",
            };
            format!("  \"{}\": {}", f.name, empty)
        })
        .collect();
    format!("{{\n{}\n}}", entries.join(",\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::fields::FieldSpec;

    fn catalogue() -> FieldCatalogue {
        FieldCatalogue::new(vec![
            FieldSpec {
                name: "valor_imovel".into(),
                kind: FieldKind::Number,
                hint: "valor total do imóvel".into(),
            },
            FieldSpec {
                name: "pesos_servicos".into(),
                kind: FieldKind::List,
                hint: String::new(),
            },
        ])
    }

    #[test]
    fn lists_every_field_with_kind() {
        let text = build_instruction(&catalogue());
        assert!(text.contains("- valor_imovel (número): valor total do imóvel"));
        assert!(text.contains("- pesos_servicos (lista de números)\n"));
    }

    #[test]
    fn carries_global_rules() {
        let text = build_instruction(&catalogue());
        assert!(text.contains("valor de mercado"));
        assert!(text.contains("sem letras cardeais"));
        assert!(text.contains("objeto JSON"));
    }

    #[test]
    fn skeleton_is_valid_json() {
        let skeleton = response_skeleton(&catalogue());
        let value: serde_json::Value = serde_json::from_str(&skeleton).unwrap();
        assert_eq!(value["valor_imovel"], "");
        assert!(value["pesos_servicos"].as_array().unwrap().is_empty());
    }

    #[test]
    fn instruction_is_stable() {
        assert_eq!(build_instruction(&catalogue()), build_instruction(&catalogue()));
    }
}
