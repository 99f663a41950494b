// Series color palette

/// Color palette for categorical data
pub struct ColorPalette {
    colors: Vec<String>,
}

impl ColorPalette {
    /// Create a Category10 color palette (D3-inspired)
    pub fn category10() -> Self {
        ColorPalette {
            colors: [
                "blue", "orange", "green", "red", "purple", "brown", "pink", "gray", "olive",
                "cyan",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }

    /// Get color for a specific index (wraps around if index > palette size)
    pub fn get_color(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_wraps() {
        let palette = ColorPalette::category10();
        assert_eq!(palette.get_color(0), "blue");
        assert_eq!(palette.get_color(11), "orange");
    }
}
