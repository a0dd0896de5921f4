use super::{Block, ReportDocument, Status, Table, REPORT_MARKER};

/// Render a document as GitHub-flavoured markdown.
pub fn render_markdown(doc: &ReportDocument) -> String {
    let mut md = String::new();

    let status = match doc.status {
        Status::Pass => "✅ PASS",
        Status::Fail => "❌ FAIL",
    };
    md.push_str(REPORT_MARKER);
    md.push('\n');
    md.push_str(&format!("## {} {}\n", doc.title, status));

    for section in &doc.sections {
        md.push_str(&format!("\n### {}\n", section.heading));
        for block in &section.blocks {
            md.push('\n');
            render_block(&mut md, block);
        }
    }

    md
}

fn render_block(md: &mut String, block: &Block) {
    match block {
        Block::Paragraph(text) => {
            md.push_str(text);
            md.push('\n');
        }
        Block::List(items) => {
            for item in items {
                md.push_str(&format!("- {}\n", item));
            }
        }
        Block::Table(table) => render_table(md, table),
    }
}

fn render_table(md: &mut String, table: &Table) {
    md.push_str(&row(&table.headers));
    md.push_str(&format!(
        "|{}\n",
        table.headers.iter().map(|_| "---|").collect::<String>()
    ));
    for cells in &table.rows {
        md.push_str(&row(cells));
    }
}

fn row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
    format!("| {} |\n", escaped.join(" | "))
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Section;

    #[test]
    fn test_renders_sections_and_tables() {
        let doc = ReportDocument {
            title: "Performance Report".into(),
            status: Status::Fail,
            sections: vec![Section {
                heading: "Results".into(),
                blocks: vec![
                    Block::Paragraph("Two pages.".into()),
                    Block::Table(Table {
                        headers: vec!["Page".into(), "LCP".into()],
                        rows: vec![vec!["/a|b".into(), "1200ms".into()]],
                    }),
                    Block::List(vec!["one".into()]),
                ],
            }],
        };

        let md = render_markdown(&doc);
        assert!(md.starts_with(REPORT_MARKER));
        assert!(md.contains("## Performance Report ❌ FAIL\n"));
        assert!(md.contains("### Results\n"));
        assert!(md.contains("| Page | LCP |\n|---|---|\n| /a\\|b | 1200ms |\n"));
        assert!(md.contains("- one\n"));
    }
}
