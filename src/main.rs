use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate, Utc};
use std::env;
use std::path::Path;

use org_ledger::{
    LedgerConfig, MetricsEngine, PaymentMode, ReportAssembler, ReportExporter, SqliteStore, MONTHS,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(args.get(2).map(String::as_str)),
        Some("seed") => run_seed(),
        Some("add-node") => run_add_node(&args),
        Some("report") => run_report(&args),
        Some("export") => run_export(&args),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("org-ledger {}", org_ledger::VERSION);
    println!();
    println!("Usage:");
    println!("  org-ledger init [root-name]          Create the database and root node");
    println!("  org-ledger seed                      Populate a small demo tree");
    println!("  org-ledger add-node <parent-code> <name>");
    println!("  org-ledger report <node-code> <year>");
    println!("  org-ledger export <node-code> <year> <dir>");
    println!();
    println!("Database path comes from ORG_LEDGER_DB or org-ledger.toml (default org-ledger.db).");
}

fn open_store() -> Result<(SqliteStore, LedgerConfig)> {
    let config = LedgerConfig::resolve(None)?;
    let store = SqliteStore::open(&config.db_path)?;
    Ok((store, config))
}

fn run_init(root_name: Option<&str>) -> Result<()> {
    let (store, config) = open_store()?;
    let name = root_name.unwrap_or("National Organization");

    println!("🔧 Initializing ledger at {:?}...", config.db_path);
    let root = store.create_root(name)?;

    println!("✓ Root node created");
    println!("  Name:     {}", root.name);
    println!("  Code:     {}", root.node_code);
    println!("  Password: {}", root.plain_password);
    Ok(())
}

fn run_seed() -> Result<()> {
    let (store, _) = open_store()?;
    let year = Utc::now().year();

    println!("🌱 Seeding demo tree...");

    let root = store.create_root("National Organization")?;
    let mut parent = root.clone();
    for name in [
        "North Zone",
        "Upper Region",
        "First Division",
        "Central District",
        "Harbor City",
        "Old Town Sector",
    ] {
        parent = store.create_child(&parent.id, name)?;
    }
    let sector = parent;

    let riverside = store.create_child(&sector.id, "Riverside Branch")?;
    let hilltop = store.create_child(&sector.id, "Hilltop Branch")?;

    let asha = store.add_member(&riverside.id, "Asha", "555-0101")?;
    let ravi = store.add_member(&riverside.id, "Ravi", "555-0102")?;
    let meera = store.add_member(&hilltop.id, "Meera", "555-0103")?;

    // A year of uneven monthly dues
    for (member, base) in [(&asha, 100.0), (&ravi, 150.0), (&meera, 80.0)] {
        for month in 1..=9u32 {
            let date = NaiveDate::from_ymd_opt(year, month, 10)
                .ok_or_else(|| anyhow!("bad seed date"))?;
            let amount = base + (month as f64) * 10.0;
            store.record_payment(&member.id, amount, date, PaymentMode::Cash, "monthly dues")?;
        }
    }

    println!("✓ Seeded 8 levels, 2 branches, 3 members, 27 payments");
    println!(
        "  Root code: {}  (password {})",
        root.node_code, root.plain_password
    );
    println!("  Try: org-ledger report {} {}", root.node_code, year);
    Ok(())
}

fn run_add_node(args: &[String]) -> Result<()> {
    let parent_code = args.get(2).ok_or_else(|| anyhow!("missing parent code"))?;
    let name = args.get(3).ok_or_else(|| anyhow!("missing node name"))?;

    let (store, _) = open_store()?;
    let parent = store.node_by_code(parent_code)?;
    let node = store.create_child(&parent.node.id, name)?;

    println!("✓ Created {} under {}", node.node_type, parent.node.name);
    println!("  Name:     {}", node.name);
    println!("  Code:     {}", node.node_code);
    println!("  Password: {}", node.plain_password);
    Ok(())
}

fn run_report(args: &[String]) -> Result<()> {
    let code = args.get(2).ok_or_else(|| anyhow!("missing node code"))?;
    let year: i32 = args
        .get(3)
        .ok_or_else(|| anyhow!("missing year"))?
        .parse()?;

    let (store, config) = open_store()?;
    let details = store.node_by_code(code)?;
    let assembler = ReportAssembler::with_rank_depth(config.rank_depth);
    let report = assembler.assemble(&store, &details.node, year)?;
    let stats = assembler.stats(&report);

    println!(
        "📊 Collection Report - {} ({}) - {}",
        report.name, report.node_type, year
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("Total collection:  {:.2}", report.total_collection);
    println!("Avg per member:    {:.2}", report.average_collection_per_user);
    println!("Members:           {}", report.total_members);
    println!("Collected today:   {:.2}", report.collections_today);
    println!(
        "MoM:               {:+.2} ({:.1}%)",
        stats.mom_delta, stats.mom_percent
    );
    println!("Run rate (3-mo):   {:.2}", stats.run_rate);
    println!(
        "Peak {} {:.2} / Trough {} {:.2} (std dev {:.2})",
        stats.peak.month, stats.peak.value, stats.trough.month, stats.trough.value, stats.std_dev
    );

    println!("\nMonth     Collection   Cumulative");
    for i in 0..12 {
        println!(
            "{:<9} {:>10.2}  {:>10.2}",
            MONTHS[i],
            report.monthly_collection.get(i),
            stats.cumulative[i]
        );
    }

    println!(
        "\nQuarters: Q1 {:.2}  Q2 {:.2}  Q3 {:.2}  Q4 {:.2}",
        stats.quarters[0], stats.quarters[1], stats.quarters[2], stats.quarters[3]
    );

    if !report.child_performances.is_empty() {
        println!("\nTop performing:");
        for (i, child) in report.top_performing_children.iter().enumerate() {
            println!("  #{} {} - {:.2}", i + 1, child.name, child.total);
        }
        println!("Low collection:");
        for (i, child) in report.worst_performing_children.iter().enumerate() {
            println!("  #{} {} - {:.2}", i + 1, child.name, child.total);
        }
    }

    Ok(())
}

fn run_export(args: &[String]) -> Result<()> {
    let code = args.get(2).ok_or_else(|| anyhow!("missing node code"))?;
    let year: i32 = args
        .get(3)
        .ok_or_else(|| anyhow!("missing year"))?
        .parse()?;
    let dir = args.get(4).ok_or_else(|| anyhow!("missing output dir"))?;

    let (store, config) = open_store()?;
    let details = store.node_by_code(code)?;
    let assembler = ReportAssembler::with_rank_depth(config.rank_depth);
    let report = assembler.assemble(&store, &details.node, year)?;

    let exporter = ReportExporter::new();
    let monthly_path = Path::new(dir).join(format!("collections-{}.csv", year));
    let children_path = Path::new(dir).join(format!("regional-performance-{}.csv", year));

    exporter.write_monthly_csv(&report, &monthly_path)?;
    exporter.write_children_csv(&report, &children_path)?;

    println!("✓ Wrote {:?}", monthly_path);
    println!("✓ Wrote {:?}", children_path);

    let stats = MetricsEngine::new().analyze(&report.monthly_collection, report.total_collection);
    if !stats.sum_matches_total {
        eprintln!(
            "⚠ independent total {:.2} differs from series sum {:.2}",
            report.total_collection,
            report.monthly_collection.sum()
        );
    }

    Ok(())
}
