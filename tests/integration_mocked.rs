/// Integration tests with mocked external APIs
/// Exercises the narrative steps and identity diagnostics without hitting real services
use brandintel_api::aggregation::AnalysisDetail;
use brandintel_api::fallbacks::{fallback_queries, fallback_variables};
use brandintel_api::integrations::identity_client::{IdentityClient, StructureComparison};
use brandintel_api::integrations::llm_client::LlmClient;
use brandintel_api::models::{
    BusinessContext, CustomerRecord, EnrichmentSource, FieldValue, Variable, VariableCategory,
};
use brandintel_api::services::NarrativeService;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn llm_for(server: &MockServer) -> LlmClient {
    LlmClient::new(
        server.uri(),
        "test_key".to_string(),
        "test-model".to_string(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_test",
        "type": "message",
        "content": [{"type": "text", "text": text}]
    }))
}

fn coffee_shop() -> BusinessContext {
    BusinessContext {
        business_name: "Roasted Bean Coffee Co.".to_string(),
        industry: "Food & Beverage".to_string(),
        business_model: "B2C".to_string(),
        target_customer: "Young urban professionals aged 25-35".to_string(),
        brand_positioning: "Fast, affordable coffee for busy mornings".to_string(),
        ..Default::default()
    }
}

async fn mount_llm(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test_key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_llm_completion_returns_trimmed_text() {
    let server = MockServer::start().await;
    mount_llm(&server, completion("  # Report\n\nBody  \n")).await;

    let text = llm_for(&server).complete("hello", 64, 0.5).await.unwrap();
    assert_eq!(text, "# Report\n\nBody");
}

#[tokio::test]
async fn test_llm_error_status_is_upstream_failure() {
    let server = MockServer::start().await;
    mount_llm(
        &server,
        ResponseTemplate::new(529).set_body_string("overloaded"),
    )
    .await;

    let err = llm_for(&server).complete("hello", 64, 0.5).await.unwrap_err();
    assert!(err.is_recoverable());
    assert!(err.to_string().contains("529"));
}

#[tokio::test]
async fn test_select_variables_from_model_output() {
    let server = MockServer::start().await;
    let selection = r#"```json
{"variables": [
  {"variable": "GENERATION", "category": "demographics", "rationale": "Check the young-customer assumption"},
  {"variable": "INCOME_HH", "category": "economic", "rationale": "Price sensitivity"},
  {"variable": "MADE_UP_FIELD", "category": "interests", "rationale": "not in catalog"}
]}
```"#;
    mount_llm(&server, completion(selection)).await;

    let llm = llm_for(&server);
    let vars = NarrativeService::new(Some(&llm))
        .select_variables(&coffee_shop())
        .await;

    let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["GENERATION", "INCOME_HH"]);
    assert_eq!(vars[1].category, VariableCategory::Economic);
}

#[tokio::test]
async fn test_select_variables_falls_back_on_malformed_output() {
    let server = MockServer::start().await;
    mount_llm(&server, completion("Sure! Here are some variables: AGE, INCOME")).await;

    let llm = llm_for(&server);
    let vars = NarrativeService::new(Some(&llm))
        .select_variables(&coffee_shop())
        .await;

    assert_eq!(vars, fallback_variables(&coffee_shop()));
    assert_eq!(vars.len(), 8);
}

#[tokio::test]
async fn test_queries_fall_back_on_server_error() {
    let server = MockServer::start().await;
    mount_llm(&server, ResponseTemplate::new(500)).await;

    let llm = llm_for(&server);
    let queries = NarrativeService::new(Some(&llm))
        .generate_queries(&coffee_shop(), &[], "# Report", None)
        .await;

    assert_eq!(queries, fallback_queries(&coffee_shop()));
}

#[tokio::test]
async fn test_queries_parsed_from_model_output() {
    let server = MockServer::start().await;
    let body = json!({
        "marketIntelligence": {
            "category": "Market Intelligence",
            "description": "Understand the current base",
            "queries": ["Which suburbs over-index on morning visits?", "  "]
        },
        "growthAudiences": {
            "category": "Growth Audiences",
            "description": "Find look-alikes",
            "queries": ["Suburban Gen X commuters with gourmet affinity"]
        }
    })
    .to_string();
    mount_llm(&server, completion(&body)).await;

    let llm = llm_for(&server);
    let queries = NarrativeService::new(Some(&llm))
        .generate_queries(&coffee_shop(), &[], "# Report", None)
        .await;

    assert_eq!(queries.market_intelligence.queries.len(), 1);
    assert_eq!(queries.growth_audiences.category, "Growth Audiences");
}

#[tokio::test]
async fn test_insights_apply_guidance_then_narrate() {
    let server = MockServer::start().await;
    // first call: threshold guidance, second call: the report
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(completion(
            r#"{"INCOME_HH": {"threshold": 150000, "label": "$150K+"}}"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(completion("# Customer Intelligence Report\n\nNarrated."))
        .mount(&server)
        .await;

    let customers: Vec<CustomerRecord> = ["$100K to $149K", "$150K to $174K", "$150K to $174K", "$60K to $74K"]
        .iter()
        .map(|income| {
            let mut r = CustomerRecord::new();
            r.insert("INCOME_HH", *income);
            r.tag(EnrichmentSource::Email);
            r
        })
        .collect();
    let vars = vec![Variable::new("INCOME_HH", VariableCategory::Economic, "pricing")];

    let llm = llm_for(&server);
    let response = NarrativeService::new(Some(&llm))
        .generate_insights(&coffee_shop(), &vars, &customers)
        .await
        .unwrap();

    assert_eq!(response.insights, "# Customer Intelligence Report\n\nNarrated.");
    let analysis = &response.aggregated_data.as_ref().unwrap().variable_analysis["INCOME_HH"];
    assert_eq!(analysis.guidance.as_deref(), Some("$150K+"));
    assert!(matches!(
        analysis.detail,
        Some(AnalysisDetail::IncomeRanges {
            high_income_percentage: 50,
            ..
        })
    ));
    // 50% is not a premium majority
    assert!(response.comparisons.is_empty());
}

#[tokio::test]
async fn test_insights_fallback_keeps_comparisons() {
    let server = MockServer::start().await;
    mount_llm(&server, ResponseTemplate::new(503)).await;

    let customers: Vec<CustomerRecord> = ["Suburban", "Suburban", "Urban"]
        .iter()
        .map(|u| {
            let mut r = CustomerRecord::new();
            r.insert("URBANICITY", FieldValue::from(*u));
            r.tag(EnrichmentSource::Pii);
            r
        })
        .collect();
    let vars = vec![Variable::new("URBANICITY", VariableCategory::Lifestyle, "")];

    let llm = llm_for(&server);
    let response = NarrativeService::new(Some(&llm))
        .generate_insights(&coffee_shop(), &vars, &customers)
        .await
        .unwrap();

    assert_eq!(response.comparisons.len(), 1);
    assert!(response.insights.starts_with("# Customer Intelligence Report"));
    assert!(response.insights.contains("67% of matched customers live in suburban areas"));
}

#[tokio::test]
async fn test_identity_diagnostics_compare_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/identities/byEmail"))
        .and(query_param("email", "Sarah.Johnson@gmail.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identities": [{"data": [{"AGE": 34, "GENDER": "F"}], "finances": {"INCOME_HH": "$100K to $149K"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/identities/bySha256"))
        .and(query_param(
            "sha256",
            brandintel_api::identity_client::email_sha256("sarah.johnson@gmail.com").as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identities": [{"data": [{"AGE": 34, "URBANICITY": "Suburban"}]}]
        })))
        .mount(&server)
        .await;

    let client = IdentityClient::new(
        server.uri(),
        "KEY".to_string(),
        "secret".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();

    let by_email = client.probe_email("Sarah.Johnson@gmail.com").await;
    let by_hash = client.probe_sha256("Sarah.Johnson@gmail.com").await;

    assert!(by_email.ok && by_hash.ok);
    assert_eq!(by_hash.hash_used.as_deref().map(str::len), Some(64));

    let comparison = StructureComparison::between(
        by_email.structure.as_ref().unwrap(),
        by_hash.structure.as_ref().unwrap(),
    );
    assert!(!comparison.identical);
    assert_eq!(comparison.missing_in_sha256, vec!["GENDER".to_string()]);
    assert_eq!(comparison.extra_in_sha256, vec!["URBANICITY".to_string()]);
    assert_eq!(comparison.common_fields, vec!["AGE".to_string()]);
}

#[tokio::test]
async fn test_identity_probe_reports_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/identities/byEmail"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad signature"))
        .mount(&server)
        .await;

    let client = IdentityClient::new(
        server.uri(),
        "KEY".to_string(),
        "wrong".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();

    let probe = client.probe_email("someone@example.com").await;
    assert!(!probe.ok);
    assert_eq!(probe.status, Some(401));
    assert_eq!(probe.error.as_deref(), Some("bad signature"));
    assert!(probe.structure.is_none());
}
