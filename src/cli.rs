use std::ops::RangeInclusive;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "medrecord-import",
    version,
    about = "Import medical record documents into the relational and document stores"
)]
pub struct Cli {
    /// First year directory to import (inclusive).
    #[arg(default_value_t = 2018)]
    pub start_year: i32,

    /// Last year directory to import (inclusive).
    #[arg(default_value_t = 2025)]
    pub end_year: i32,
}

impl Cli {
    pub fn year_range(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }
}
