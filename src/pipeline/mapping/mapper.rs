use super::output::{CellValue, OutputState, OutputStateBuilder};
use super::schema::{ListRegion, ScalarRegion, TargetSchema, Underflow};
use crate::models::{DocumentPresence, ProfessionalProfile};
use crate::pipeline::normalize::to_number;
use crate::pipeline::structuring::StructuredRecord;
use crate::registry::ProfessionalRegistry;

/// Projects a structured record onto the template coordinates.
///
/// Holds the schema and the professional registry it was built with; a
/// mapping run reads nothing else.
pub struct SchemaMapper {
    schema: TargetSchema,
    registry: ProfessionalRegistry,
}

impl SchemaMapper {
    pub fn new(schema: TargetSchema, registry: ProfessionalRegistry) -> Self {
        Self { schema, registry }
    }

    /// Restrict mapping to the sheets that exist in the template workbook.
    pub fn bind_to_sheets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = self.schema.bind_to_sheets(names);
        self
    }

    pub fn professional(&self, name: &str) -> Option<&ProfessionalProfile> {
        self.registry.get(name)
    }

    pub fn map(
        &self,
        record: &StructuredRecord,
        professional: &ProfessionalProfile,
        presence: DocumentPresence,
    ) -> OutputState {
        let mut out = OutputStateBuilder::new();

        for region in &self.schema.regions {
            if self.skip_missing_sheet(&mut out, &region.name, &region.sheet) {
                continue;
            }
            map_scalar_region(&mut out, region, record, presence);
        }

        for list in &self.schema.lists {
            if self.skip_missing_sheet(&mut out, &list.name, &list.sheet) {
                continue;
            }
            if let Some(kind) = list.requires.filter(|k| !presence.has(*k)) {
                tracing::debug!(region = %list.name, document = %kind, "Document absent, list left at template default");
                continue;
            }
            map_list_region(&mut out, list, record);
        }

        if let Some(block) = &self.schema.professional {
            if !self.skip_missing_sheet(&mut out, &block.name, &block.sheet) {
                for binding in &block.cells {
                    out.set(
                        &block.sheet,
                        binding.cell,
                        &block.name,
                        CellValue::Text(professional.field(binding.field).to_string()),
                    );
                }
            }
        }

        for binding in &self.schema.presence {
            let region = format!("presenca_{}", binding.document.as_str());
            if self.skip_missing_sheet(&mut out, &region, &binding.sheet) {
                continue;
            }
            let label = if presence.has(binding.document) {
                &binding.present
            } else {
                &binding.absent
            };
            out.set(&binding.sheet, binding.cell, &region, CellValue::Text(label.clone()));
        }

        let state = out.build();
        tracing::info!(
            cells = state.len(),
            skipped = state.skipped().len(),
            professional = %professional.display_name,
            "Schema mapping complete"
        );
        state
    }

    fn skip_missing_sheet(&self, out: &mut OutputStateBuilder, region: &str, sheet: &str) -> bool {
        if self.schema.sheet_available(sheet) {
            return false;
        }
        tracing::warn!(region, sheet, "Sheet missing from template, region skipped");
        out.skip(region, sheet);
        true
    }
}

fn map_scalar_region(
    out: &mut OutputStateBuilder,
    region: &ScalarRegion,
    record: &StructuredRecord,
    presence: DocumentPresence,
) {
    for binding in &region.cells {
        if binding.requires.is_some_and(|k| !presence.has(k)) {
            continue;
        }
        let raw = record.scalar(&binding.field);
        let value = if binding.numeric {
            CellValue::Number(to_number(raw))
        } else {
            CellValue::Text(raw.map(|s| s.to_string().to_uppercase()).unwrap_or_default())
        };
        out.set(&region.sheet, binding.cell, &region.name, value);
    }
}

fn map_list_region(out: &mut OutputStateBuilder, list: &ListRegion, record: &StructuredRecord) {
    let values = record.list(&list.field);
    let capacity = list.max_slots as usize;

    if values.len() > capacity {
        tracing::debug!(
            region = %list.name,
            provided = values.len(),
            max_slots = list.max_slots,
            "List longer than region, extra entries dropped"
        );
    }

    for index in 0..list.max_slots {
        let value = match values.get(index as usize) {
            Some(v) => to_number(v),
            None if list.underflow == Underflow::ZeroFill => 0.0,
            None => break,
        };
        // Validated at load; a slot past the sheet end only happens with hand-built schemas.
        let Some(cell) = list.slot(index) else {
            break;
        };
        out.set(&list.sheet, cell, &list.name, CellValue::Number(value));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::pipeline::mapping::schema::TemplateProfile;
    use crate::pipeline::structuring::{FieldValue, Scalar};

    fn professional() -> ProfessionalProfile {
        ProfessionalProfile {
            display_name: "Ana Lima".into(),
            company_name: "LIMA ENGENHARIA LTDA".into(),
            company_tax_id: "00.000.000/0001-00".into(),
            owner_tax_id: None,
            signer_name: "ANA LIMA".into(),
            signer_tax_id: "000.000.000-00".into(),
            registration_number: "CREA 0000000000".into(),
        }
    }

    fn registry() -> ProfessionalRegistry {
        ProfessionalRegistry::from_profiles([professional()]).unwrap()
    }

    fn mapper() -> SchemaMapper {
        let profile = TemplateProfile::bundled().unwrap();
        SchemaMapper::new(profile.schema, registry())
    }

    fn record(fields: Vec<(&str, FieldValue)>) -> StructuredRecord {
        StructuredRecord::new(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn numbers(n: usize) -> FieldValue {
        FieldValue::List((1..=n).map(|i| Scalar::Number(i as f64)).collect())
    }

    fn all_present() -> DocumentPresence {
        DocumentPresence {
            has_progress_schedule: true,
            has_permit: true,
        }
    }

    fn num(v: f64) -> Option<CellValue> {
        Some(CellValue::Number(v))
    }

    #[test]
    fn numeric_scalars_are_normalized() {
        let rec = record(vec![
            ("valor_imovel", FieldValue::Scalar("R$ 1.234.567,89".into())),
            ("percentual_pls", FieldValue::Scalar("45,5%".into())),
        ]);
        let out = mapper().map(&rec, &professional(), all_present());
        assert_eq!(out.value_at("RAE", "AH66").cloned(), num(1234567.89));
        assert_eq!(out.value_at("DADOS", "D24").cloned(), num(1234567.89));
        assert_eq!(out.value_at("RAE", "W93").cloned(), num(45.5));
    }

    #[test]
    fn text_scalars_are_uppercased() {
        let rec = record(vec![
            ("contratacao", FieldValue::Scalar("12/mar/2024".into())),
            ("numero", FieldValue::Scalar(Scalar::Number(120.0))),
        ]);
        let out = mapper().map(&rec, &professional(), all_present());
        assert_eq!(
            out.value_at("RAE", "AH63"),
            Some(&CellValue::Text("12/MAR/2024".into()))
        );
        assert_eq!(out.value_at("DADOS", "D10"), Some(&CellValue::Text("120".into())));
        // absent text field still writes an empty string
        assert_eq!(out.value_at("DADOS", "D11"), Some(&CellValue::Text(String::new())));
    }

    #[test]
    fn list_overflow_is_truncated_to_max_slots() {
        let rec = record(vec![("pesos_servicos", numbers(25))]);
        let out = mapper().map(&rec, &professional(), all_present());

        assert_eq!(out.region_len("pesos_servicos"), 20);
        assert_eq!(out.value_at("RAE", "AJ99").cloned(), num(1.0));
        assert_eq!(out.value_at("RAE", "AJ118").cloned(), num(20.0));
        assert!(out.value_at("RAE", "AJ119").is_none());
    }

    #[test]
    fn list_underflow_zero_fills_weights() {
        let rec = record(vec![("pesos_servicos", numbers(5))]);
        let out = mapper().map(&rec, &professional(), all_present());

        assert_eq!(out.region_len("pesos_servicos"), 20);
        assert_eq!(out.value_at("RAE", "AJ103").cloned(), num(5.0));
        for row in 104..=118 {
            assert_eq!(out.value_at("RAE", &format!("AJ{row}")).cloned(), num(0.0));
        }
    }

    #[test]
    fn list_underflow_leaves_progress_blank() {
        let rec = record(vec![("acumulado_previsto", numbers(3))]);
        let out = mapper().map(&rec, &professional(), all_present());

        assert_eq!(out.region_len("acumulado_previsto"), 3);
        assert_eq!(out.value_at("RAE", "AJ126").cloned(), num(3.0));
        assert!(out.value_at("RAE", "AJ127").is_none());
    }

    #[test]
    fn list_entries_are_normalized() {
        let rec = record(vec![(
            "acumulado_previsto",
            FieldValue::List(vec!["12,5%".into(), "".into(), "abc".into()]),
        )]);
        let out = mapper().map(&rec, &professional(), all_present());
        assert_eq!(out.value_at("RAE", "AJ124").cloned(), num(12.5));
        assert_eq!(out.value_at("RAE", "AJ125").cloned(), num(0.0));
        assert_eq!(out.value_at("RAE", "AJ126").cloned(), num(0.0));
    }

    #[test]
    fn primary_only_run_skips_optional_bindings() {
        let rec = record(vec![
            ("alvara_emissao", FieldValue::Scalar("01/01/2024".into())),
            ("alvara_validade", FieldValue::Scalar("01/01/2026".into())),
            ("percentual_pls", FieldValue::Scalar("30".into())),
            ("acumulado_pls", numbers(4)),
        ]);
        let out = mapper().map(&rec, &professional(), DocumentPresence::default());

        assert_eq!(out.value_at("RAE", "AH72"), Some(&CellValue::Text("Não".into())));
        assert_eq!(out.value_at("RAE", "AH91"), Some(&CellValue::Text("Não".into())));
        assert!(out.value_at("RAE", "AH74").is_none());
        assert!(out.value_at("RAE", "AH75").is_none());
        assert!(out.value_at("RAE", "W93").is_none());
        assert_eq!(out.region_len("acumulado_pls"), 0);
    }

    #[test]
    fn presence_labels_follow_submission() {
        let presence = DocumentPresence {
            has_progress_schedule: false,
            has_permit: true,
        };
        let out = mapper().map(&record(vec![]), &professional(), presence);
        assert_eq!(out.value_at("RAE", "AH72"), Some(&CellValue::Text("Sim".into())));
        assert_eq!(out.value_at("RAE", "AH91"), Some(&CellValue::Text("Não".into())));
        assert_eq!(out.value_at("RAE", "AH74"), Some(&CellValue::Text(String::new())));
    }

    #[test]
    fn professional_block_copied_verbatim() {
        let mut pro = professional();
        pro.company_name = "Lima Engenharia".into();
        let out = mapper().map(&record(vec![]), &pro, all_present());

        assert_eq!(out.value_at("RAE", "I315"), Some(&CellValue::Text("Lima Engenharia".into())));
        assert_eq!(out.value_at("RAE", "AE316"), Some(&CellValue::Text("000.000.000-00".into())));
        assert_eq!(out.value_at("RAE", "AO316"), Some(&CellValue::Text("CREA 0000000000".into())));
    }

    #[test]
    fn missing_sheet_is_skipped_not_fatal() {
        let mapper = mapper().bind_to_sheets(["RAE"]);
        let rec = record(vec![("proponente", FieldValue::Scalar("joão".into()))]);
        let out = mapper.map(&rec, &professional(), all_present());

        assert!(out.value_at("DADOS", "D6").is_none());
        assert_eq!(out.skipped().len(), 1);
        assert_eq!(out.skipped()[0].region, "entrada");
        assert!(out.value_at("RAE", "AH63").is_some());
    }

    #[test]
    fn lookup_goes_through_injected_registry() {
        let mapper = mapper();
        assert!(mapper.professional("ana lima").is_some());
        assert!(mapper.professional("Desconhecido").is_none());
    }
}
