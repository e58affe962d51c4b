use core::{fmt::Display, time::Duration};
use hashbrown::HashMap;

/// Aggregated launch durations, keyed by kernel name.
#[derive(Debug, Default)]
pub struct Profiled {
    launches: HashMap<String, LaunchStats>,
}

#[derive(Debug, Default, Clone, Copy)]
struct LaunchStats {
    wall: Duration,
    core_time: Duration,
    count: usize,
}

impl Profiled {
    /// If some launch was profiled.
    pub fn is_empty(&self) -> bool {
        self.launches.is_empty()
    }

    /// Number of launches recorded under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.launches.get(name).map_or(0, |stats| stats.count)
    }

    /// Records one launch of `name` that kept `cores` cores busy for `duration`.
    pub fn update(&mut self, name: &str, duration: Duration, cores: u32) {
        let stats = self.launches.entry_ref(name).or_default();
        stats.wall += duration;
        stats.core_time += duration * cores;
        stats.count += 1;
    }
}

const HEADERS: [&str; 5] = ["Kernel", "Duration", "Core time", "Launches", "Ratio"];

impl Display for Profiled {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut entries: Vec<(&String, &LaunchStats)> = self.launches.iter().collect();
        entries.sort_by(|(_, lhs), (_, rhs)| rhs.wall.cmp(&lhs.wall));

        let total = entries
            .iter()
            .fold(LaunchStats::default(), |acc, (_, stats)| LaunchStats {
                wall: acc.wall + stats.wall,
                core_time: acc.core_time + stats.core_time,
                count: acc.count + stats.count,
            });
        let total_micros = total.wall.as_micros().max(1);

        let row = |name: &str, stats: &LaunchStats| {
            [
                name.to_string(),
                format!("{:?}", stats.wall),
                format!("{:?}", stats.core_time),
                stats.count.to_string(),
                format!("{} %", 100 * stats.wall.as_micros() / total_micros),
            ]
        };
        let rows: Vec<[String; 5]> = entries
            .iter()
            .map(|(name, stats)| row(name, stats))
            .collect();
        let total_row = row("Total", &total);

        let mut widths = HEADERS.map(str::len);
        for cells in rows.iter().chain(core::iter::once(&total_row)) {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }
        let line_length = widths.iter().sum::<usize>() + 3 * widths.len() + 1;

        let write_cells = |cells: &[&str], f: &mut core::fmt::Formatter<'_>| {
            write!(f, "|")?;
            for (cell, width) in cells.iter().zip(widths) {
                write!(f, " {cell:<width$} |")?;
            }
            writeln!(f)
        };
        let write_rule =
            |rule: &str, f: &mut core::fmt::Formatter<'_>| writeln!(f, "{}", rule.repeat(line_length));

        write_rule("⎺", f)?;
        write_cells(&HEADERS, f)?;
        write_rule("⎼", f)?;
        for cells in rows.iter() {
            write_cells(&cells.each_ref().map(String::as_str), f)?;
        }
        write_rule("⎼", f)?;
        write_cells(&total_row.each_ref().map(String::as_str), f)?;
        write_rule("⎯", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn summary_lists_every_kernel() {
        let mut profiled = Profiled::default();
        profiled.update("quant_matmul", Duration::from_millis(3), 20);
        profiled.update("quant_matmul", Duration::from_millis(1), 20);
        profiled.update("padding", Duration::from_millis(4), 2);

        let table = profiled.to_string();

        assert_eq!(profiled.count("quant_matmul"), 2);
        assert_eq!(profiled.count("basic_matmul"), 0);
        assert!(table.contains("| quant_matmul"));
        assert!(table.contains("| padding"));
        assert!(table.contains("| Total"));
        assert!(table.contains("80ms"));
    }
}
