use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use garden_activity_reports::*;
use std::sync::Arc;
use std::time::Duration;

fn irrigation(id: usize, month: u32, day: u32, quantity: f64, unit: &str) -> ActivityRecord {
    ActivityRecord {
        id: format!("irr-{}", id),
        garden_id: "garden-7".to_string(),
        author_id: "user-1".to_string(),
        author_name: Some("María".to_string()),
        author_role: AuthorRole::Owner,
        category: ActivityCategory::Irrigation,
        created_at: Utc.with_ymd_and_hms(2024, month, day, 7, 30, 0).unwrap(),
        content: "Riego de la mañana".to_string(),
        details: ActivityDetails {
            quantity: Some(quantity),
            unit: Some(unit.to_string()),
            method: Some("drip".to_string()),
            ..ActivityDetails::default()
        },
    }
}

/// Six records in May totaling 3000 mL, six in June totaling 4500 mL,
/// written with mixed units.
fn twelve_irrigation_records() -> Vec<ActivityRecord> {
    let may = [
        (500.0, "ml"),
        (0.5, "l"),
        (400.0, "mL"),
        (600.0, "ml"),
        (0.25, "L"),
        (750.0, "ml"),
    ];
    let june = [
        (1.0, "l"),
        (0.5, "litros"),
        (750.0, "ml"),
        (600.0, "ml"),
        (900.0, "ml"),
        (750.0, "ml"),
    ];

    let mut records = Vec::new();
    for (i, (q, u)) in may.iter().enumerate() {
        records.push(irrigation(i, 5, 2 + i as u32 * 4, *q, u));
    }
    for (i, (q, u)) in june.iter().enumerate() {
        records.push(irrigation(10 + i, 6, 1 + i as u32 * 3, *q, u));
    }
    records
}

fn mixed_records(count: usize) -> Vec<ActivityRecord> {
    (0..count)
        .map(|i| {
            let category = ActivityCategory::DECLARED_ORDER[i % 7];
            let month = 3 + (i % 4) as u32;
            let mut details = ActivityDetails::default();
            match category {
                ActivityCategory::Maintenance => {
                    details.duration = Some(30.0 + i as f64);
                    details.duration_unit = Some("min".to_string());
                    details.task = Some("Weeding".to_string());
                }
                ActivityCategory::Pest => {
                    details.pest_species = Some("aphid".to_string());
                    details.pest_level = Some(PestLevel::ALL[i % 3]);
                }
                _ => {
                    details.quantity = Some(1.0 + (i % 5) as f64);
                    details.unit = Some("kg".to_string());
                    details.crop = Some("Lettuce".to_string());
                }
            }
            ActivityRecord {
                id: format!("rec-{}", i),
                garden_id: "garden-7".to_string(),
                author_id: format!("user-{}", i % 3),
                author_name: None,
                author_role: AuthorRole::Collaborator,
                category,
                created_at: Utc
                    .with_ymd_and_hms(2024, month, 1 + (i % 28) as u32, 10, 0, 0)
                    .unwrap(),
                content: format!("Entry number {} with a fairly long note about the bed", i),
                details,
            }
        })
        .collect()
}

fn request(kind: ReportKind) -> ReportRequest {
    ReportRequest {
        garden_id: "garden-7".to_string(),
        garden_name: "Huerto Los Álamos".to_string(),
        reference_date: NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(),
        start: None,
        end: None,
        kind,
    }
}

struct Canned;

#[async_trait]
impl NarrativeInsightService for Canned {
    async fn analyze(&self, request: &InsightRequest) -> Result<InsightResponse> {
        Ok(InsightResponse {
            analysis: format!("**Resumen** de {} secciones 🌱", request.sections.len()),
        })
    }
}

struct NeverAnswers;

#[async_trait]
impl NarrativeInsightService for NeverAnswers {
    async fn analyze(&self, _request: &InsightRequest) -> Result<InsightResponse> {
        std::future::pending::<Result<InsightResponse>>().await
    }
}

struct BrokenRenderer;

impl ChartRenderer for BrokenRenderer {
    fn render(&self, _request: &ChartRequest) -> Result<ChartImage> {
        Err(GardenReportError::Chart("out of memory".to_string()))
    }
}

fn orchestrator(
    records: Vec<ActivityRecord>,
    service: Arc<dyn NarrativeInsightService>,
) -> ReportOrchestrator {
    ReportOrchestrator::new(
        ReportConfig::default(),
        Arc::new(InMemorySource::new(records)),
        service,
    )
    .unwrap()
}

fn count_charts(doc: &Document) -> usize {
    doc.elements()
        .filter(|p| matches!(p.element, Element::Chart { .. }))
        .count()
}

fn body_rows(doc: &Document) -> usize {
    doc.elements()
        .filter(|p| matches!(p.element, Element::TableRow { header: false, .. }))
        .count()
}

fn assert_no_overflow(doc: &Document) {
    let limit = doc.geometry.content_limit();
    for page in &doc.pages {
        for placed in page.elements.iter().filter(|p| p.element.is_content()) {
            assert!(
                placed.y >= doc.geometry.top_offset,
                "{:?} starts above the content area on page {}",
                placed.element,
                page.number
            );
            assert!(
                placed.y + placed.height <= limit,
                "{:?} overflows page {}",
                placed.element,
                page.number
            );
        }
    }
}

#[test]
fn test_unit_normalization() {
    assert_eq!(normalize(Some(500.0), "ml"), 500.0);
    assert_eq!(normalize(Some(2.0), "l"), 2000.0);
    assert_eq!(normalize(Some(1.0), "kg"), 1.0);
    assert_eq!(normalize(None, "kg"), 0.0);
}

#[test]
fn test_filter_returns_subset_within_range() {
    let records = mixed_records(60);
    let start = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
    let filter = RecordFilter::default().between(Some(start), Some(end));
    let filtered = filter_records(&records, &filter);

    assert!(!filtered.is_empty());
    for record in &filtered {
        assert!(records.contains(record));
        assert!(record.created_on() >= start && record.created_on() <= end);
    }
}

#[test]
fn test_twelve_record_trend() {
    let records = twelve_irrigation_records();
    let trend = TrendAnalyzer::new(TrendConfig::default())
        .analyze(ActivityCategory::Irrigation, &records, None)
        .unwrap();

    assert!((trend.previous_month_avg.unwrap() - 500.0).abs() < 1e-9);
    assert!((trend.current_month_avg - 750.0).abs() < 1e-9);
    assert!((trend.percent_change.unwrap() - 50.0).abs() < 1e-9);
    assert_eq!(trend.trend_tag, TrendTag::Ascending);
    assert_eq!(trend.current_count, 6);
    assert!(trend.alerts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_category_end_to_end() {
    let orch = orchestrator(twelve_irrigation_records(), Arc::new(Canned));
    let artifact = orch
        .generate(&request(ReportKind::Category(ActivityCategory::Irrigation)))
        .await
        .unwrap();
    let doc = &artifact.document;

    assert_eq!(artifact.file_name, "irrigation_huerto_los_alamos_2024-06-20.json");
    assert_eq!(count_charts(doc), 1);
    assert_eq!(body_rows(doc), 12);
    assert!(doc.contains_text("Resumen de 1 secciones"));
    assert!(doc.contains_text("+50.0%"));
    assert!(doc.contains_text("Page 1 of"));
    assert_no_overflow(doc);

    // narrative stays on the cover page, chart and table start a new one
    let chart_page = doc
        .pages
        .iter()
        .find(|p| p.elements.iter().any(|e| matches!(e.element, Element::Chart { .. })))
        .unwrap();
    assert!(chart_page.number > 1);
    assert_eq!(orch.progress().value(), 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_composition_is_deterministic() {
    let records = mixed_records(120);
    let first = orchestrator(records.clone(), Arc::new(Canned))
        .generate(&request(ReportKind::Full))
        .await
        .unwrap();
    let second = orchestrator(records, Arc::new(Canned))
        .generate(&request(ReportKind::Full))
        .await
        .unwrap();

    assert_eq!(first.document.page_count(), second.document.page_count());
    assert_eq!(first.document, second.document);
    assert_eq!(first.bytes, second.bytes);
}

#[tokio::test(start_paused = true)]
async fn test_full_report_never_overflows() {
    let artifact = orchestrator(mixed_records(400), Arc::new(Canned))
        .generate(&request(ReportKind::Full))
        .await
        .unwrap();
    let doc = &artifact.document;

    assert_no_overflow(doc);
    assert_eq!(body_rows(doc), 400 + 7);
    let total = doc.page_count();
    for page in &doc.pages {
        let footer = page.elements.last().unwrap();
        assert_eq!(
            footer.element,
            Element::Footer {
                text: format!("Page {} of {}", page.number, total)
            }
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_narrative_falls_back() {
    let config = ReportConfig {
        insight: InsightConfig {
            fallback_text: "Analysis unavailable.".to_string(),
            ..InsightConfig::default()
        },
        ..ReportConfig::default()
    };
    let orch = ReportOrchestrator::new(
        config,
        Arc::new(InMemorySource::new(twelve_irrigation_records())),
        Arc::new(NeverAnswers),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    let artifact = orch
        .generate(&request(ReportKind::Category(ActivityCategory::Irrigation)))
        .await
        .unwrap();

    assert!(artifact.document.contains_text("Analysis unavailable."));
    assert!(started.elapsed() < Duration::from_secs(31));
    assert_eq!(count_charts(&artifact.document), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_narrative_full_report_falls_back() {
    let config = ReportConfig {
        insight: InsightConfig {
            fallback_text: "Analysis unavailable.".to_string(),
            ..InsightConfig::default()
        },
        ..ReportConfig::default()
    };
    let orch = ReportOrchestrator::new(
        config,
        Arc::new(InMemorySource::new(mixed_records(70))),
        Arc::new(NeverAnswers),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    let artifact = orch.generate(&request(ReportKind::Full)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(artifact.document.contains_text("Analysis unavailable."));
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed <= Duration::from_secs(61));
    assert_eq!(orch.progress().value(), 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_full_report_section_order() {
    let artifact = orchestrator(mixed_records(70), Arc::new(Canned))
        .generate(&request(ReportKind::Full))
        .await
        .unwrap();
    let doc = &artifact.document;

    assert_eq!(
        artifact.file_name,
        "reporte_completo_huerto_huerto_los_alamos_2024-06-20.json"
    );
    assert!(doc.contains_text("Resumen de 7 secciones"));

    let headings: Vec<(usize, String)> = doc
        .pages
        .iter()
        .flat_map(|page| {
            page.elements.iter().filter_map(move |p| match &p.element {
                Element::Heading { text, .. } => Some((page.number, text.clone())),
                _ => None,
            })
        })
        .collect();

    let mut expected = vec!["Executive summary".to_string(), "Analysis".to_string()];
    expected.extend(ActivityCategory::DECLARED_ORDER.iter().map(|c| c.label().to_string()));
    let texts: Vec<String> = headings.iter().map(|(_, t)| t.clone()).collect();
    assert_eq!(texts, expected);

    // every category section opens its own page
    let category_pages: Vec<usize> = headings[2..].iter().map(|(n, _)| *n).collect();
    for pair in category_pages.windows(2) {
        assert!(pair[1] > pair[0]);
    }
    assert!(category_pages[0] > headings[1].0);

    // six categories carry a chart, general notes do not
    assert_eq!(count_charts(doc), 6);
}

#[tokio::test(start_paused = true)]
async fn test_custom_category_order() {
    let config = ReportConfig {
        category_order: vec![ActivityCategory::Pest, ActivityCategory::Irrigation],
        ..ReportConfig::default()
    };
    let orch = ReportOrchestrator::new(
        config,
        Arc::new(InMemorySource::new(mixed_records(30))),
        Arc::new(DisabledInsightService),
    )
    .unwrap();
    let doc = orch.generate(&request(ReportKind::Full)).await.unwrap().document;

    let headings: Vec<String> = doc
        .elements()
        .filter_map(|p| match &p.element {
            Element::Heading { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(&headings[2..], &["Pest control", "Irrigation"]);
    assert!(doc.contains_text(DEFAULT_FALLBACK_TEXT.split('.').next().unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_chart_failure_degrades_to_tables() {
    let orch =
        orchestrator(mixed_records(50), Arc::new(Canned)).with_renderer(Arc::new(BrokenRenderer));
    let artifact = orch.generate(&request(ReportKind::Full)).await.unwrap();

    assert_eq!(count_charts(&artifact.document), 0);
    assert!(artifact.document.contains_text("Chart unavailable"));
    assert_eq!(body_rows(&artifact.document), 50 + 7);
}

#[tokio::test(start_paused = true)]
async fn test_empty_garden_still_produces_report() {
    let artifact = orchestrator(Vec::new(), Arc::new(DisabledInsightService))
        .generate(&request(ReportKind::Category(ActivityCategory::Harvest)))
        .await
        .unwrap();

    assert_eq!(count_charts(&artifact.document), 0);
    assert!(artifact.document.contains_text("No records for this period"));
}

#[tokio::test(start_paused = true)]
async fn test_source_failure_resets_progress() {
    let orch = ReportOrchestrator::new(
        ReportConfig::default(),
        Arc::new(JsonFileSource::new("/no/such/records.json")),
        Arc::new(DisabledInsightService),
    )
    .unwrap();

    let result = orch.generate(&request(ReportKind::Full)).await;
    assert!(matches!(result, Err(GardenReportError::Source(_))));
    assert_eq!(orch.progress().snapshot(), ProgressSnapshot::default());
    assert!(!orch.progress().is_ticking());
}

#[tokio::test]
async fn test_records_from_json_file() -> anyhow::Result<()> {
    let records = twelve_irrigation_records();
    let path = std::env::temp_dir().join(format!("garden-it-{}.json", std::process::id()));
    tokio::fs::write(&path, serde_json::to_vec(&records)?).await?;

    let orch = ReportOrchestrator::from_config(
        ReportConfig::default(),
        Arc::new(JsonFileSource::new(&path)),
    )?;
    let artifact = orch
        .generate(&request(ReportKind::Category(ActivityCategory::Irrigation)))
        .await?;
    tokio::fs::remove_file(&path).await?;

    assert_eq!(body_rows(&artifact.document), 12);
    let out_dir = std::env::temp_dir().join(format!("garden-it-out-{}", std::process::id()));
    let written = artifact.write_to(&out_dir).await?;
    let reloaded: Document = serde_json::from_slice(&tokio::fs::read(&written).await?)?;
    assert_eq!(reloaded, artifact.document);
    tokio::fs::remove_dir_all(&out_dir).await?;
    Ok(())
}

#[test]
fn test_schema_generation() {
    let schema = ActivityRecord::schema_as_json().unwrap();
    assert!(schema.contains("created_at"));
    assert!(schema.contains("irrigation"));
    assert!(schema.contains("pest_level"));
}
