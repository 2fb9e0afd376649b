use action_locator::{DomNode, LocateContext, Role};
use action_primitives::{CdpPage, PageDriver};
use anyhow::{Context, Result};
use serde::Serialize;
use stockmeta_core_types::ImageId;

use super::commands::AttachArgs;
use super::context::CliContext;
use super::output::emit;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleRow {
    role: String,
    strategy: Option<&'static str>,
    element: Option<String>,
    next_id: Option<ImageId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectReport {
    url: String,
    nodes: usize,
    roles: Vec<RoleRow>,
    cards: usize,
    cards_with_images: usize,
    tour_banner: bool,
}

/// `tag#id[data-test-id] "text"` style one-liner.
fn describe(node: &DomNode) -> String {
    let mut out = node.tag.clone();
    if let Some(id) = node.get_attr("id") {
        out.push_str(&format!("#{id}"));
    }
    for attr in ["data-test-id", "data-testid", "aria-label", "role"] {
        if let Some(value) = node.get_attr(attr) {
            out.push_str(&format!("[{attr}={value}]"));
        }
    }
    if let Some(src) = node.src() {
        out.push_str(&format!(" src={}", ImageId::from_url_or_unknown(src)));
    }
    let text = node.text.trim();
    if !text.is_empty() {
        let short: String = text.chars().take(40).collect();
        out.push_str(&format!(" \"{short}\""));
    }
    out
}

pub async fn cmd_inspect(args: AttachArgs, ctx: &CliContext) -> Result<()> {
    let adapter = ctx.attach(&args).await?;
    let url = adapter.attached().map(|p| p.url).unwrap_or_default();
    let page = CdpPage::new(adapter.clone());
    let snapshot = page.snapshot().await.context("Failed to read the page")?;
    adapter.shutdown().await;

    let locator = ctx.locator();
    let roles = Role::ALL
        .iter()
        .map(|role| {
            let found = locator.locate(&snapshot, *role, &LocateContext::default());
            RoleRow {
                role: role.to_string(),
                strategy: found.as_ref().map(|f| f.strategy),
                element: found.as_ref().map(|f| describe(snapshot.node(f.node))),
                next_id: found.and_then(|f| f.next_id),
            }
        })
        .collect();
    let cards = locator.cards(&snapshot);
    let report = InspectReport {
        url,
        nodes: snapshot.len(),
        roles,
        cards: cards.len(),
        cards_with_images: cards.iter().filter(|c| c.image.is_some()).count(),
        tour_banner: locator.find_tour_banner(&snapshot).is_some(),
    };

    emit(ctx.output(), &report, |report| {
        println!("{} ({} elements)", report.url, report.nodes);
        for row in &report.roles {
            match (&row.strategy, &row.element) {
                (Some(strategy), Some(element)) => {
                    print!("  {:<14} {:<24} {}", row.role, strategy, element);
                    if let Some(next) = &row.next_id {
                        print!(" -> {}", next);
                    }
                    println!();
                }
                _ => println!("  {:<14} (not found)", row.role),
            }
        }
        println!(
            "  cards: {} ({} with images)",
            report.cards, report.cards_with_images
        );
        if report.tour_banner {
            println!("  onboarding tour banner is showing");
        }
    })
}
