use cabinet_store::Table;
use serde::Serialize;

/// Print any response as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render the first `limit` rows of a table as aligned text.
pub fn render_table(table: &Table, limit: usize) -> String {
    let headers: Vec<String> = table
        .columns()
        .iter()
        .map(|c| format!("{} ({})", c.name(), c.dtype()))
        .collect();
    let shown = table.num_rows().min(limit);
    let cells: Vec<Vec<String>> = (0..shown)
        .filter_map(|i| table.row(i))
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_line(&mut out, &headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    if table.num_rows() > shown {
        out.push_str(&format!("... {} more rows\n", table.num_rows() - shown));
    }
    out.push_str(&format!(
        "({} rows x {} columns)",
        table.num_rows(),
        table.num_columns()
    ));
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_store::Payload;
    use serde_json::json;

    fn titanic() -> Table {
        Payload::Rows {
            records: vec![
                json!({"name": "Allen", "age": 29}).as_object().unwrap().clone(),
                json!({"name": "Allison"}).as_object().unwrap().clone(),
                json!({"name": "Andrews", "age": 39}).as_object().unwrap().clone(),
            ],
        }
        .normalize()
        .unwrap()
    }

    #[test]
    fn columns_are_aligned_with_types() {
        let text = render_table(&titanic(), 10);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "age (int)  name (text)");
        assert_eq!(lines[1], "---------  -----------");
        assert_eq!(lines[2], "29         Allen");
        assert_eq!(lines[3], "null       Allison");
        assert_eq!(lines.last().copied(), Some("(3 rows x 2 columns)"));
    }

    #[test]
    fn long_tables_are_truncated() {
        let text = render_table(&titanic(), 1);
        assert!(text.contains("... 2 more rows"));
        assert!(!text.contains("Andrews"));
    }
}
