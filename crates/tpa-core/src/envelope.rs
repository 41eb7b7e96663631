use crate::cases::CaseSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const ENVELOPE_SCHEMA: &str = "tpa.run/0.2";

const DEFAULT_CASE_ID: &str = "local";
const DEFAULT_APPLICATION_TYPE: &str = "householder";
const DEFAULT_SITE_ID: &str = "site-1";
const DEFAULT_DOCUMENT_KIND: &str = "doc";

/// Outbound description of a case. Field order here is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub schema: String,
    pub case: EnvelopeCase,
    pub site: EnvelopeSite,
    pub documents: Vec<EnvelopeDocument>,
    pub policy_scope: Vec<Value>,
    pub constraints_layers: Vec<Value>,
    pub goals: Vec<Value>,
    pub consultation: Vec<Value>,
    pub figures: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeCase {
    pub id: String,
    #[serde(rename = "type")]
    pub case_type: String,
    pub lpa_code: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSite {
    pub id: String,
    pub geometry: Option<Value>,
    pub geometry_ref: Option<String>,
    pub uprn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeDocument {
    pub id: String,
    pub kind: String,
    pub uri: String,
    pub mime: Option<String>,
}

/// Builds the envelope for a case. `None` is the "no case" path and yields
/// an envelope made entirely of defaults.
pub fn build(case: Option<&dyn CaseSource>) -> Envelope {
    let documents = case
        .and_then(|c| c.documents())
        .unwrap_or_default()
        .into_iter()
        .map(|d| EnvelopeDocument {
            id: d.id,
            kind: d.kind.unwrap_or_else(|| DEFAULT_DOCUMENT_KIND.to_string()),
            uri: d.uri.unwrap_or_default(),
            mime: d.mime,
        })
        .collect();

    let site_id = case
        .and_then(|c| c.site_address())
        .map(|addr| slugify(&addr))
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| DEFAULT_SITE_ID.to_string());

    Envelope {
        schema: ENVELOPE_SCHEMA.to_string(),
        case: EnvelopeCase {
            id: case
                .and_then(|c| c.id())
                .unwrap_or_else(|| DEFAULT_CASE_ID.to_string()),
            case_type: case
                .and_then(|c| c.application_type())
                .unwrap_or_else(|| DEFAULT_APPLICATION_TYPE.to_string()),
            lpa_code: case.and_then(|c| c.local_authority_code()),
            reference: case.and_then(|c| c.reference()),
        },
        site: EnvelopeSite {
            id: site_id,
            geometry: case.and_then(|c| c.site_boundary_geometry()),
            geometry_ref: None,
            uprn: None,
        },
        documents,
        policy_scope: Vec::new(),
        constraints_layers: Vec::new(),
        goals: Vec::new(),
        consultation: Vec::new(),
        figures: Vec::new(),
    }
}

/// URL-safe slug: Latin letters are transliterated (`é` to `e`, `ß` to `ss`),
/// then lowercase ASCII alphanumerics and `_` are kept, with every other run
/// of characters collapsed to a single `-` and no leading or trailing `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in transliterate(s).chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.nfkd().filter(|c| !is_combining_mark(*c)) {
        match ch {
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'đ' | 'ð' => out.push('d'),
            'Đ' | 'Ð' => out.push('D'),
            'þ' => out.push_str("th"),
            'Þ' => out.push_str("TH"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{CaseDocument, CaseRecord};
    use serde_json::json;

    struct Bare;
    impl CaseSource for Bare {}

    #[test]
    fn no_case_yields_defaults() {
        let env = build(None);
        assert_eq!(env.schema, "tpa.run/0.2");
        assert_eq!(env.case.id, "local");
        assert_eq!(env.case.case_type, "householder");
        assert_eq!(env.case.lpa_code, None);
        assert_eq!(env.site.id, "site-1");
        assert!(env.documents.is_empty());
    }

    #[test]
    fn source_without_capabilities_matches_no_case() {
        let env = build(Some(&Bare));
        assert_eq!(env, build(None));
    }

    #[test]
    fn exposed_capabilities_flow_through() {
        let case = CaseRecord {
            id: Some("42".into()),
            application_type: Some("full".into()),
            local_authority_code: Some("E09000033".into()),
            reference: Some("24/00123/FUL".into()),
            site_address: Some("  10 Downing St, London SW1A 2AA ".into()),
            site_boundary: Some(json!({"type": "Polygon", "coordinates": []})),
            documents: Some(vec![
                CaseDocument {
                    id: "d1".into(),
                    kind: Some("plan".into()),
                    uri: Some("https://docs/d1.pdf".into()),
                    mime: Some("application/pdf".into()),
                },
                CaseDocument {
                    id: "d2".into(),
                    ..Default::default()
                },
            ]),
        };
        let env = build(Some(&case));
        assert_eq!(env.case.id, "42");
        assert_eq!(env.case.case_type, "full");
        assert_eq!(env.case.lpa_code.as_deref(), Some("E09000033"));
        assert_eq!(env.site.id, "10-downing-st-london-sw1a-2aa");
        assert_eq!(env.site.geometry, Some(json!({"type": "Polygon", "coordinates": []})));
        assert_eq!(env.documents.len(), 2);
        assert_eq!(env.documents[1].kind, "doc");
        assert_eq!(env.documents[1].uri, "");
        assert_eq!(env.documents[1].mime, None);
    }

    #[test]
    fn wire_shape_keeps_nulls_and_empty_arrays() {
        let v = serde_json::to_value(build(None)).unwrap();
        assert_eq!(v["case"]["type"], "householder");
        assert!(v["case"]["reference"].is_null());
        assert!(v["site"]["uprn"].is_null());
        for key in ["policy_scope", "constraints_layers", "goals", "consultation", "figures"] {
            assert_eq!(v[key], json!([]), "{key}");
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Flat 2, 14a High-Street"), "flat-2-14a-high-street");
        assert_eq!(slugify("--Old_Mill--"), "old_mill");
        assert_eq!(slugify("  "), "");
    }

    #[test]
    fn slugify_transliterates_accented_letters() {
        assert_eq!(slugify("Café Row"), "cafe-row");
        assert_eq!(slugify("Grüne Straße 5"), "grune-strasse-5");
        assert_eq!(slugify("Ærø Œuvre"), "aero-oeuvre");
        assert_eq!(slugify("Łódź ½"), "lodz-1-2");
    }

    #[test]
    fn blank_address_falls_back_to_default_site() {
        let case = CaseRecord {
            site_address: Some("???".into()),
            ..Default::default()
        };
        assert_eq!(build(Some(&case)).site.id, "site-1");
    }
}
