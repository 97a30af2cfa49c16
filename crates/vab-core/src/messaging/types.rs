/// Reply keyboard (menu buttons under the input field).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
}

impl ReplyKeyboard {
    /// Lay out `labels` left to right, `columns` per row.
    pub fn with_columns(labels: Vec<String>, columns: usize) -> Self {
        let columns = columns.max(1);
        let rows = labels
            .chunks(columns)
            .map(|chunk| chunk.to_vec())
            .collect();
        Self { rows }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|s| s.as_str())
    }
}
