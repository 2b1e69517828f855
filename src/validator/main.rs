//! Standalone validator for listing data files.
//!
//! This tool checks a listings JSON file for structural problems:
//! unparsable content, missing or empty required fields, non-numeric
//! prices and duplicate ids.

use std::collections::{BTreeMap, HashSet};
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;

/// Text fields every listing must carry, besides `id` and `user_id`.
const REQUIRED_TEXT_FIELDS: [&str; 5] = ["price", "district", "photo", "city", "address"];

/// Listing data file validator.
#[derive(Parser, Debug)]
#[command(name = "validate_listings")]
#[command(about = "Validates listing data files for the rental bot")]
#[command(version)]
struct Args {
    /// Path to the JSON data file to validate.
    #[arg(short, long, default_value = "data.json")]
    file: String,

    /// Show every listing as it is checked.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    validate_file(&args.file, args.verbose)
}

fn validate_file(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("✗ Failed to read file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let listings: Vec<Value> = match serde_json::from_str(&content) {
        Ok(listings) => listings,
        Err(e) => {
            eprintln!("✗ Failed to parse file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut problems = 0usize;
    let mut seen_ids = HashSet::new();
    let mut per_city: BTreeMap<String, usize> = BTreeMap::new();

    for (index, listing) in listings.iter().enumerate() {
        let issues = check_listing(listing, &mut seen_ids);

        if let Some(city) = listing.get("city").and_then(Value::as_str) {
            *per_city.entry(city.to_owned()).or_default() += 1;
        }

        if issues.is_empty() {
            if verbose {
                let id = listing.get("id").and_then(Value::as_str).unwrap_or("?");
                println!("✓ [{index}] {id}");
            }
        } else {
            problems += issues.len();
            for issue in issues {
                println!("✗ [{index}] {issue}");
            }
        }
    }

    println!("\nTotal listings: {}", listings.len());
    if !per_city.is_empty() {
        println!("Listings per city:");
        for (city, count) in &per_city {
            println!("  {city}: {count}");
        }
    }

    if problems == 0 {
        println!("\n✓ All listings are valid");
        ExitCode::SUCCESS
    } else {
        println!("\n✗ Found {problems} problem(s)");
        ExitCode::FAILURE
    }
}

/// Checks a single listing entry, returning a description per problem.
fn check_listing(listing: &Value, seen_ids: &mut HashSet<String>) -> Vec<String> {
    let mut issues = Vec::new();

    match listing.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {
            if !seen_ids.insert(id.to_owned()) {
                issues.push(format!("duplicate id: {id}"));
            }
        }
        Some(_) => issues.push("empty id".to_owned()),
        None => issues.push("missing id".to_owned()),
    }

    for field in REQUIRED_TEXT_FIELDS {
        match listing.get(field).and_then(Value::as_str) {
            Some(value) if !value.is_empty() => {}
            Some(_) => issues.push(format!("empty field: {field}")),
            None => issues.push(format!("missing field: {field}")),
        }
    }

    if let Some(price) = listing.get("price").and_then(Value::as_str)
        && !price.is_empty()
        && !price.chars().all(|c| c.is_ascii_digit())
    {
        issues.push(format!("price is not numeric: {price}"));
    }

    if listing.get("user_id").and_then(Value::as_i64).is_none() {
        issues.push("missing or non-integer user_id".to_owned());
    }

    issues
}
