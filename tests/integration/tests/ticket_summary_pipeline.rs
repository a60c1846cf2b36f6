use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

use canary_core::{JsonFileProcessedIdStore, ProcessedIdStore};
use canary_extract::{
    render_comment_html, Extractor, ExtractorConfig, GenerationError, GenerationRequest,
    OutputContract, Provenance, TextGenerator,
};
use canary_ticket::{normalize_ticket, normalize_ticket_batch};
use serde_json::{json, Value};
use tempfile::tempdir;

struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(GenerationError::Unavailable(
                    "scripted response queue exhausted".to_string(),
                ))
            })
    }
}

fn search_payload() -> Value {
    json!([
        {
            "id": "3012",
            "title": "SSO login returns 504",
            "htmlcontent": "<p>Since 9am nobody can log in.</p><p><img src=\"https://files.example.com/504.png\"></p>",
            "created_at": "2025-08-21 14:03:00",
            "customers": {"77": {"title": "Acme Ltda"}},
            "contacts": {
                "12": {"fullname": "Bruno Lima"},
                "13": {"fullname": "Ana Souza", "default": true}
            },
            "lists": {"5": {"title": "Support N1", "boards": {"9": {"title": "IT"}}}}
        },
        {
            "id": 3013,
            "subject": "Lunch order for Friday",
            "description": "Please order pizza for the team.",
            "customer": {"id": "78", "fullname": "Globex"},
            "contacts": [{"id": "20", "first_name": "Carla", "last_name": "Dias"}]
        }
    ])
}

#[test]
fn integration_shape_variants_normalize_to_equal_tickets() {
    let keyed = normalize_ticket(&json!({
        "id": "1",
        "title": "A",
        "contacts": {"20": {"fullname": "Carla Dias"}, "21": {"fullname": "Davi"}}
    }))
    .expect("keyed");
    let sequence = normalize_ticket(&json!({
        "id": "1",
        "title": "A",
        "contacts": [{"id": "20", "fullname": "Carla Dias"}, {"id": "21", "fullname": "Davi"}]
    }))
    .expect("sequence");

    assert_eq!(keyed, sequence);
    assert_eq!(keyed.contact_name(), Some("Carla Dias"));
}

#[test]
fn integration_search_payload_flows_through_normalize_and_extract() {
    let tickets: Vec<_> = normalize_ticket_batch(&search_payload())
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("all records are objects");
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].contact_name(), Some("Ana Souza"));
    assert_eq!(tickets[1].contact_name(), Some("Carla Dias"));
    assert_eq!(tickets[1].customer_name(), Some("Globex"));
    assert!(tickets[0].belongs_to_parent("9"));
    assert!(!tickets[1].belongs_to_parent("9"));

    let generator = ScriptedGenerator::new(vec![
        Ok(json!({
            "problem_summary": "SSO gateway returns 504 for all users",
            "suggested_solution": "Restart the SSO connector",
            "action_items": ["Check IdP status", "Restart SSO connector"]
        })
        .to_string()),
        Err(GenerationError::Unavailable(
            "'response_format' is not supported".to_string(),
        )),
        Ok("{\"resumo_problema\": \"\", \"sugestao_solucao\": \"\"}".to_string()),
    ]);
    let extractor = Extractor::new(ExtractorConfig::default());

    let support = extractor.extract(&tickets[0], &generator);
    let lunch = extractor.extract(&tickets[1], &generator);

    assert_eq!(generator.request_count(), 3);
    assert_eq!(support.provenance, Provenance::SchemaValidated);
    assert_eq!(
        support.action_items,
        vec!["Check IdP status", "Restart SSO connector"]
    );
    assert_eq!(lunch.provenance, Provenance::FreeTextParsed);
    assert_eq!(lunch.problem_summary, "");

    let requests = generator.requests.lock().expect("requests lock");
    assert_eq!(
        requests[0].user.image_refs,
        vec!["https://files.example.com/504.png"]
    );
    assert!(requests[0].user.text.contains("Contact: Ana Souza"));
    assert!(requests[0]
        .user
        .text
        .contains("Created at: 2025-08-21T14:03:00+00:00"));
    assert_eq!(requests[2].contract, OutputContract::FreeText);

    let html = render_comment_html(&support);
    assert!(html.starts_with("<b>Problem summary (AI):</b><br>SSO gateway returns 504"));
}

#[test]
fn integration_processed_ids_replace_previous_fetch() {
    let temp = tempdir().expect("tempdir");
    let store = JsonFileProcessedIdStore::new(temp.path().join("state").join("processed_ids.json"));
    assert!(store.load().expect("initial load").is_empty());

    let first: HashSet<String> = ["3012", "3013"].map(str::to_string).into();
    store.save(&first).expect("save first fetch");
    let second: HashSet<String> = ["3013", "3014"].map(str::to_string).into();
    store.save(&second).expect("save second fetch");

    assert_eq!(store.load().expect("reload"), second);
    let raw = std::fs::read_to_string(store.path()).expect("state file");
    assert_eq!(raw, "[\"3013\",\"3014\"]");
}
