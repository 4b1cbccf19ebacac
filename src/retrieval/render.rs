//! Turns search hits into response text.

use async_trait::async_trait;

use super::document::{Document, ScoredDocument};
use crate::core::errors::ApiError;

/// Downstream text generation used by the context-then-generate policy.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        query: &str,
    ) -> Result<String, ApiError>;
}

/// Header line followed by one bullet per hit, fields copied verbatim:
///
/// `- Title (Country): description | Points: 91, Price: $45`
pub fn render_listing(header: &str, hits: &[ScoredDocument]) -> String {
    let bullets: Vec<String> = hits.iter().map(|hit| listing_bullet(&hit.document)).collect();
    let mut response = String::new();
    if !header.trim().is_empty() {
        response.push_str(header.trim_end());
        response.push_str("\n\n");
    }
    response.push_str(&bullets.join("\n\n"));
    response.trim().to_string()
}

fn listing_bullet(document: &Document) -> String {
    let mut bullet = String::from("- ");
    match (&document.title, &document.category) {
        (Some(title), Some(category)) => bullet.push_str(&format!("{} ({}): ", title, category)),
        (Some(title), None) => bullet.push_str(&format!("{}: ", title)),
        (None, Some(category)) => bullet.push_str(&format!("({}): ", category)),
        (None, None) => {}
    }
    bullet.push_str(document.content.trim());

    let mut facts = Vec::new();
    if let Some(score) = &document.score {
        facts.push(format!("Points: {}", score));
    }
    if let Some(price) = &document.price {
        facts.push(format!("Price: ${}", price));
    }
    if !facts.is_empty() {
        bullet.push_str(" | ");
        bullet.push_str(&facts.join(", "));
    }
    bullet
}

/// Numbered reference passages for the generator, nearest first. Every
/// metadata field the row carries is listed under its passage.
pub fn build_context(hits: &[ScoredDocument]) -> String {
    hits.iter()
        .enumerate()
        .map(|(rank, hit)| context_passage(rank + 1, &hit.document))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn context_passage(rank: usize, document: &Document) -> String {
    let mut passage = match &document.title {
        Some(title) => format!("[{}] {}\n{}", rank, title, document.content.trim()),
        None => format!("[{}] {}", rank, document.content.trim()),
    };

    let labelled = [
        ("category", &document.category),
        ("points", &document.score),
        ("price", &document.price),
    ];
    for (label, value) in labelled {
        if let Some(value) = value {
            passage.push_str(&format!("\n{}: {}", label, value));
        }
    }
    for (name, value) in &document.extra {
        passage.push_str(&format!("\n{}: {}", name, value));
    }
    passage
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(document: Document) -> ScoredDocument {
        ScoredDocument {
            document,
            distance: 0.0,
        }
    }

    #[test]
    fn listing_copies_fields_verbatim() {
        let hits = vec![
            hit(Document::new(0, "Blackberry and cassis.")
                .with_title("Ridge 2019 Cabernet Sauvignon")
                .with_category("US")
                .with_score("91")
                .with_price("45")),
            hit(Document::new(1, "Crisp green apple.")
                .with_title("Laroche 2021 Chablis")
                .with_score("88")
                .with_price("24.5")),
        ];

        assert_eq!(
            render_listing("Here are some wines you might enjoy:", &hits),
            "Here are some wines you might enjoy:\n\n\
             - Ridge 2019 Cabernet Sauvignon (US): Blackberry and cassis. | Points: 91, Price: $45\n\n\
             - Laroche 2021 Chablis: Crisp green apple. | Points: 88, Price: $24.5"
        );
    }

    #[test]
    fn bare_documents_render_content_only() {
        let hits = vec![hit(Document::new(0, "  Juicy and plush.  "))];
        assert_eq!(render_listing("", &hits), "- Juicy and plush.");
    }

    #[test]
    fn listing_keeps_non_canonical_numbers_as_written() {
        let hits = vec![
            hit(Document::new(0, "Plush.")
                .with_title("Ridge")
                .with_category("US")
                .with_score("91")
                .with_price("45.50")),
            hit(Document::new(1, "Crisp.")
                .with_title("Petrus")
                .with_category("FR")
                .with_score("88")
                .with_price("1,200")),
        ];

        let text = render_listing("", &hits);
        assert!(text.contains("- Ridge (US): Plush. | Points: 91, Price: $45.50"));
        assert!(text.contains("- Petrus (FR): Crisp. | Points: 88, Price: $1,200"));
    }

    #[test]
    fn context_lists_metadata_under_each_passage() {
        let mut document = Document::new(0, "Cassis.")
            .with_title("Ridge")
            .with_category("US")
            .with_price("45.50");
        document
            .extra
            .insert("variety".to_string(), "Cabernet Sauvignon".to_string());

        assert_eq!(
            build_context(&[hit(document)]),
            "[1] Ridge\nCassis.\ncategory: US\nprice: 45.50\nvariety: Cabernet Sauvignon"
        );
    }

    #[test]
    fn context_numbers_passages_by_rank() {
        let hits = vec![
            hit(Document::new(4, "Firm tannins.").with_title("Cabernet")),
            hit(Document::new(1, "Buttery.")),
        ];
        assert_eq!(build_context(&hits), "[1] Cabernet\nFirm tannins.\n\n[2] Buttery.");
    }
}
