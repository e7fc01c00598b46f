//! Small helpers shared by the command implementations.

use std::io::{self, Write};

/// Writes a result table with a header row and `|`-separated columns, each column padded to its
/// widest value.
pub fn print_table(out: &mut Write,
                   col_names: &[String],
                   rows: &[Vec<String>])
                   -> io::Result<()> {
    let mut widths: Vec<usize> = col_names.iter().map(String::len).collect();
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() && value.len() > widths[i] {
                widths[i] = value.len();
            }
        }
    }

    let write_row = |out: &mut Write, values: &[String]| -> io::Result<()> {
        let mut line = String::from("|");
        for (i, value) in values.iter().enumerate() {
            line.push_str(&format!(" {:1$} |", value, widths.get(i).cloned().unwrap_or(0)));
        }
        writeln!(out, "{}", line)
    };

    let separator = {
        let mut line = String::from("+");
        for width in widths.iter() {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };

    writeln!(out, "{}", separator)?;
    write_row(out, col_names)?;
    writeln!(out, "{}", separator)?;
    for row in rows {
        write_row(out, row)?;
    }
    writeln!(out, "{}", separator)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_table_pads_columns() {
        let mut out: Vec<u8> = Vec::new();
        print_table(&mut out,
                    &["A".to_string(), "LONG_HEADER".to_string()],
                    &[vec!["1".to_string(), "x".to_string()],
                      vec!["22222".to_string(), "y".to_string()]])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(6, lines.len());
        assert!(lines[1].contains("| A     | LONG_HEADER |"));
        assert!(lines[3].contains("| 1     | x           |"));
    }
}
