//! Table reconstruction from Tesseract TSV output.
//!
//! Words carry pixel bounding boxes; columns are clustered from `left`
//! positions and rows from vertical centers, then each word lands in the
//! nearest cell. Reconstruction is geometry-only and deliberately ignorant
//! of the text.

use crate::types::TsvWord;

/// TSV row level for words.
const TSV_WORD_LEVEL: u32 = 5;
/// Minimum field count of a well-formed TSV data row.
const TSV_MIN_FIELDS: usize = 12;

/// Parse Tesseract TSV output into word records.
///
/// Keeps only word-level rows with non-blank text and confidence at or above
/// `min_confidence`; malformed rows are skipped.
pub fn extract_words(tsv_data: &str, min_confidence: f64) -> Vec<TsvWord> {
    let mut words = Vec::new();

    for (line_num, line) in tsv_data.lines().enumerate() {
        if line_num == 0 {
            continue;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }

        let level: u32 = fields[0].parse().unwrap_or(0);
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let conf: f64 = fields[10].parse().unwrap_or(-1.0);
        if conf < min_confidence {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        words.push(TsvWord {
            level,
            page_num: fields[1].parse().unwrap_or(1),
            block_num: fields[2].parse().unwrap_or(0),
            par_num: fields[3].parse().unwrap_or(0),
            line_num: fields[4].parse().unwrap_or(0),
            word_num: fields[5].parse().unwrap_or(0),
            left: fields[6].parse().unwrap_or(0),
            top: fields[7].parse().unwrap_or(0),
            width: fields[8].parse().unwrap_or(0),
            height: fields[9].parse().unwrap_or(0),
            conf,
            text: text.to_string(),
        });
    }

    words
}

fn median_int(values: &[f64]) -> i32 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as i32
    } else {
        ((sorted[mid - 1] + sorted[mid]) / 2.0) as i32
    }
}

/// Cluster column x-positions by single-linkage gap grouping.
///
/// Sorted unique lefts start a new column whenever the gap to the previous
/// position exceeds `column_threshold`; each column sits at the median of its
/// members.
pub fn detect_columns(words: &[TsvWord], column_threshold: i32) -> Vec<i32> {
    if words.is_empty() {
        return Vec::new();
    }

    let mut x_positions: Vec<i32> = words.iter().map(|w| w.left).collect();
    x_positions.sort_unstable();
    x_positions.dedup();

    if x_positions.len() == 1 {
        return x_positions;
    }

    let mut columns = Vec::new();
    let mut current_group: Vec<f64> = vec![x_positions[0] as f64];

    for &x in &x_positions[1..] {
        let last = *current_group.last().expect("group is never empty");
        if (x as f64 - last) <= column_threshold as f64 {
            current_group.push(x as f64);
        } else {
            columns.push(median_int(&current_group));
            current_group = vec![x as f64];
        }
    }
    columns.push(median_int(&current_group));

    columns
}

/// Cluster row y-positions from word vertical centers.
///
/// The grouping threshold is `mean(word height) * row_threshold_ratio`; a
/// center joins the current group while it stays within the threshold of the
/// group mean.
pub fn detect_rows(words: &[TsvWord], row_threshold_ratio: f64) -> Vec<i32> {
    if words.is_empty() {
        return Vec::new();
    }

    let mean_height: f64 = words.iter().map(|w| w.height as f64).sum::<f64>() / words.len() as f64;
    let threshold = mean_height * row_threshold_ratio;

    let mut y_centers: Vec<f64> = words.iter().map(|w| w.top as f64 + w.height as f64 / 2.0).collect();
    y_centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if y_centers.len() == 1 {
        return vec![y_centers[0] as i32];
    }

    let mut rows = Vec::new();
    let mut current_group: Vec<f64> = vec![y_centers[0]];

    for &y in &y_centers[1..] {
        let mean: f64 = current_group.iter().sum::<f64>() / current_group.len() as f64;
        if y - mean <= threshold {
            current_group.push(y);
        } else {
            rows.push(median_int(&current_group));
            current_group = vec![y];
        }
    }
    rows.push(median_int(&current_group));

    rows
}

fn find_closest_index(value: f64, positions: &[i32]) -> usize {
    positions
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (value - **a as f64)
                .abs()
                .partial_cmp(&(value - **b as f64).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn remove_empty_rows_cols(table: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let table: Vec<Vec<String>> = table
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect();

    if table.is_empty() {
        return Vec::new();
    }

    let width = table[0].len();
    let non_empty_cols: Vec<usize> = (0..width)
        .filter(|&col| table.iter().any(|row| row.get(col).is_some_and(|c| !c.trim().is_empty())))
        .collect();

    if non_empty_cols.is_empty() {
        return Vec::new();
    }

    table
        .into_iter()
        .map(|row| {
            non_empty_cols
                .iter()
                .map(|&col| row.get(col).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Rebuild the table grid from words and detected structure.
///
/// Every word is placed into the cell whose column and row positions are
/// closest to its geometry; collisions append with a single space.
pub fn reconstruct_table(words: &[TsvWord], column_threshold: i32, row_threshold_ratio: f64) -> Vec<Vec<String>> {
    if words.is_empty() {
        return Vec::new();
    }

    let col_positions = detect_columns(words, column_threshold);
    let row_positions = detect_rows(words, row_threshold_ratio);

    if col_positions.is_empty() || row_positions.is_empty() {
        return Vec::new();
    }

    let mut table = vec![vec![String::new(); col_positions.len()]; row_positions.len()];

    for word in words {
        let col_idx = find_closest_index(word.left as f64, &col_positions);
        let y_center = word.top as f64 + word.height as f64 / 2.0;
        let row_idx = find_closest_index(y_center, &row_positions);

        let cell = &mut table[row_idx][col_idx];
        if cell.is_empty() {
            cell.push_str(&word.text);
        } else {
            cell.push(' ');
            cell.push_str(&word.text);
        }
    }

    remove_empty_rows_cols(table)
}

/// Render a grid as a Markdown table: first row is the header, then a `---`
/// separator row, then pipe-delimited data rows.
pub fn table_to_markdown(table: &[Vec<String>]) -> String {
    let Some(header) = table.first() else {
        return String::new();
    };
    if header.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(table.len() + 1);
    lines.push(format!("| {} |", header.join(" | ")));
    lines.push(format!("| {} |", vec!["---"; header.len()].join(" | ")));

    for row in &table[1..] {
        let mut padded: Vec<&str> = row.iter().map(String::as_str).collect();
        padded.resize(header.len(), "");
        lines.push(format!("| {} |", padded[..header.len()].join(" | ")));
    }

    lines.join("\n")
}

/// Flatten words back into line-oriented plain text, in reading order.
pub fn words_to_text(words: &[TsvWord]) -> String {
    let mut ordered: Vec<&TsvWord> = words.iter().collect();
    ordered.sort_by_key(|w| (w.page_num, w.block_num, w.par_num, w.line_num, w.word_num));

    let mut lines: Vec<String> = Vec::new();
    let mut current_key = None;

    for word in ordered {
        let key = (word.page_num, word.block_num, word.par_num, word.line_num);
        if current_key != Some(key) {
            lines.push(String::new());
            current_key = Some(key);
        }
        let line = lines.last_mut().expect("line pushed above");
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word.text);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV_HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv_row(line_num: u32, word_num: u32, left: i32, top: i32, conf: f64, text: &str) -> String {
        format!("5\t1\t1\t1\t{}\t{}\t{}\t{}\t80\t30\t{}\t{}", line_num, word_num, left, top, conf, text)
    }

    fn three_by_three() -> Vec<TsvWord> {
        let mut tsv = vec![TSV_HEADER.to_string()];
        let texts = [
            ["Name", "Age", "City"],
            ["Alice", "34", "Berlin"],
            ["Bob", "29", "Paris"],
        ];
        for (row, tops) in [100, 150, 200].iter().enumerate() {
            for (col, left) in [100, 250, 400].iter().enumerate() {
                tsv.push(tsv_row(row as u32 + 1, col as u32, *left, *tops, 95.0, texts[row][col]));
            }
        }
        extract_words(&tsv.join("\n"), 30.0)
    }

    #[test]
    fn test_extract_words_filters_levels_and_confidence() {
        let tsv = format!(
            "{}\n3\t1\t1\t0\t0\t0\t0\t0\t100\t100\t-1\t\n{}\n{}",
            TSV_HEADER,
            tsv_row(1, 0, 100, 100, 95.0, "kept"),
            tsv_row(1, 1, 200, 100, 10.0, "dropped")
        );

        let words = extract_words(&tsv, 30.0);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "kept");
        assert_eq!(words[0].left, 100);
    }

    #[test]
    fn test_extract_words_skips_malformed_rows() {
        let tsv = format!("{}\nnot\tenough\tfields\n{}", TSV_HEADER, tsv_row(1, 0, 10, 10, 90.0, "ok"));
        let words = extract_words(&tsv, 0.0);
        assert_eq!(words.len(), 1);
    }

    #[test]
    fn test_detect_columns_gap_grouping() {
        let words = three_by_three();
        let columns = detect_columns(&words, 20);
        assert_eq!(columns, vec![100, 250, 400]);
    }

    #[test]
    fn test_detect_columns_merges_close_positions() {
        let tsv = format!(
            "{}\n{}\n{}\n{}",
            TSV_HEADER,
            tsv_row(1, 0, 100, 100, 90.0, "a"),
            tsv_row(1, 1, 110, 100, 90.0, "b"),
            tsv_row(1, 2, 300, 100, 90.0, "c"),
        );
        let words = extract_words(&tsv, 0.0);
        let columns = detect_columns(&words, 20);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0], 105);
    }

    #[test]
    fn test_detect_rows() {
        let words = three_by_three();
        let rows = detect_rows(&words, 0.5);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_reconstruct_round_trip() {
        let words = three_by_three();
        let table = reconstruct_table(&words, 20, 0.5);

        assert_eq!(table.len(), 3);
        assert_eq!(table[0].len(), 3);
        assert_eq!(table[0], vec!["Name", "Age", "City"]);
        assert_eq!(table[1], vec!["Alice", "34", "Berlin"]);
        assert_eq!(table[2], vec!["Bob", "29", "Paris"]);
    }

    #[test]
    fn test_markdown_rendering() {
        let words = three_by_three();
        let table = reconstruct_table(&words, 20, 0.5);
        let markdown = table_to_markdown(&table);

        let lines: Vec<&str> = markdown.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "| Name | Age | City |");
        assert_eq!(lines[1], "| --- | --- | --- |");
        assert_eq!(lines[2], "| Alice | 34 | Berlin |");
        assert_eq!(lines[3], "| Bob | 29 | Paris |");
    }

    #[test]
    fn test_cell_collision_appends_with_space() {
        let tsv = format!(
            "{}\n{}\n{}",
            TSV_HEADER,
            tsv_row(1, 0, 100, 100, 90.0, "two"),
            tsv_row(1, 1, 105, 100, 90.0, "words"),
        );
        let words = extract_words(&tsv, 0.0);
        let table = reconstruct_table(&words, 20, 0.5);
        assert_eq!(table, vec![vec!["two words".to_string()]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_words("", 0.0).is_empty());
        assert!(reconstruct_table(&[], 20, 0.5).is_empty());
        assert_eq!(table_to_markdown(&[]), "");
    }

    #[test]
    fn test_words_to_text_reading_order() {
        let words = three_by_three();
        let text = words_to_text(&words);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Name Age City");
        assert_eq!(lines[1], "Alice 34 Berlin");
        assert_eq!(lines[2], "Bob 29 Paris");
    }
}
