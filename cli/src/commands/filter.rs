use anyhow::{Context, Result};
use lead_filter::{
    coerce_string, evaluate, parse_rules, parse_sort, EvaluationRequest, EvaluationResult,
    FieldCatalog, FilterGroup, PageRequest, Record,
};
use lead_sync::{RetryPolicy, SupabaseClient, SupabaseConfig};
use std::path::Path;
use tabular::{Row, Table};

use crate::argparse::FilterArgs;

pub async fn handle_filter_command(args: FilterArgs) -> Result<()> {
    let catalog = match &args.catalog {
        Some(path) => load_catalog(path)?,
        None => FieldCatalog::crm_contacts(),
    };
    let records = load_records(&args).await?;
    let request = build_request(&args)?;
    tracing::debug!(
        "Evaluating {} rules over {} records",
        request.filters.len(),
        records.len()
    );

    let result = evaluate(&records, &catalog, &request)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_table(&catalog, &result));
        println!(
            "page {}/{}, {} total",
            request.page.page.max(1),
            result.total_pages,
            result.total_count
        );
    }
    Ok(())
}

/// Catalogs are TOML when the file says so by extension, JSON otherwise.
fn load_catalog(path: &Path) -> Result<FieldCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let catalog = if is_toml {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?
    };
    Ok(catalog)
}

async fn load_records(args: &FilterArgs) -> Result<Vec<Record>> {
    if let Some(path) = &args.records {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file: {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("Expected a JSON array of objects in {}", path.display()));
    }

    let table = args
        .table
        .as_deref()
        .context("Either --records or --table is required")?;
    let config = SupabaseConfig::load(&args.config)?;
    let client = SupabaseClient::new(&config, RetryPolicy::default())?;
    client.fetch_records(table, args.fetch_size).await
}

fn build_request(args: &FilterArgs) -> Result<EvaluationRequest> {
    let mut request = match &args.rules {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse rules file: {}", path.display()))?
        }
        None => {
            let sorts = args
                .sorts
                .iter()
                .map(|s| parse_sort(s))
                .collect::<Result<Vec<_>, _>>()?;
            EvaluationRequest::default()
                .with_query(args.query.clone().unwrap_or_default())
                .with_filters(parse_rules(&args.filters)?)
                .with_groups(args.groups.iter().map(FilterGroup::new).collect())
                .with_sorts(sorts)
        }
    };

    if args.page.is_some() || args.page_size.is_some() {
        request.page = PageRequest::new(
            args.page.unwrap_or(request.page.page),
            args.page_size.unwrap_or(request.page.page_size),
        );
    }
    Ok(request)
}

fn render_table(catalog: &FieldCatalog, result: &EvaluationResult<'_>) -> Table {
    #[allow(clippy::literal_string_with_formatting_args)]
    let spec = vec!["{:<}"; catalog.fields.len()].join("  ");
    let mut table = Table::new(&spec).with_row(Row::from_cells(
        catalog.fields.iter().map(|field| field.key.clone()),
    ));
    for record in &result.items {
        table.add_row(Row::from_cells(
            catalog
                .fields
                .iter()
                .map(|field| coerce_string(record.get(&field.key)).into_owned()),
        ));
    }
    table
}
