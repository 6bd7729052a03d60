use super::App;
use crate::output::{self, Format};
use anyhow::Result;
use bm25_core::{DocId, NewDocument, StoredDocument};
use clap::Subcommand;
use serde::Serialize;

#[derive(Subcommand)]
pub enum DocCommand {
    /// Add a document
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long, default_value = "")]
        category: String,
        /// Explicit id; assigned automatically when omitted
        #[arg(long)]
        id: Option<DocId>,
    },
    /// Delete a document
    Delete { id: DocId },
    /// Replace fields of a document; omitted fields keep their value
    Update {
        id: DocId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Show a stored document
    Show { id: DocId },
}

#[derive(Serialize)]
struct DocView<'a> {
    id: DocId,
    title: &'a str,
    content: &'a str,
    category: &'a str,
    length: u64,
    created_at: String,
}

fn view(doc: &StoredDocument) -> DocView<'_> {
    DocView {
        id: doc.id,
        title: doc.field_text(0),
        content: doc.field_text(1),
        category: doc.field_text(2),
        length: doc.total_length,
        created_at: output::rfc3339(doc.created_at),
    }
}

pub fn run(app: &App, cmd: DocCommand) -> Result<()> {
    match cmd {
        DocCommand::Add { title, content, category, id } => {
            let mut doc = NewDocument::new().field("title", title).field("content", content).field("category", category);
            doc.id = id;
            let id = app.index.insert(doc)?;
            app.commit()?;
            println!("Added document {id}");
        }
        DocCommand::Delete { id } => {
            let doc = app.index.delete(id)?;
            app.commit()?;
            println!("Deleted document {id} ({})", doc.field_text(0));
        }
        DocCommand::Update { id, title, content, category } => {
            let current = app.index.document(id)?;
            let pick = |given: Option<String>, field| given.unwrap_or_else(|| current.field_text(field).to_string());
            let doc = NewDocument::new()
                .field("title", pick(title, 0))
                .field("content", pick(content, 1))
                .field("category", pick(category, 2))
                .created_at(current.created_at);
            app.index.update(id, doc)?;
            app.commit()?;
            println!("Updated document {id}");
        }
        DocCommand::Show { id } => {
            let doc = app.index.document(id)?;
            let v = view(&doc);
            match app.format {
                Format::Json => output::print_json(&v)?,
                Format::Csv => output::print_csv(
                    &["id", "title", "category", "length", "created_at", "content"],
                    [[v.id.to_string(), v.title.into(), v.category.into(), v.length.to_string(), v.created_at.clone(), v.content.into()]],
                )?,
                Format::Text => {
                    println!("Document {}", v.id);
                    println!("Title:    {}", v.title);
                    println!("Category: {}", v.category);
                    println!("Length:   {} tokens", v.length);
                    println!("Created:  {}", v.created_at);
                    println!("\n{}", v.content);
                }
            }
        }
    }
    Ok(())
}
