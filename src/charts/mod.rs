//! Interactive HTML chart artifacts.
//!
//! Each chart module builds a Plotly figure from the analysis results and
//! renders it through the shared HTML shell. Color use is deliberately
//! restrained: neutral grays for series, red/dark-slate only for the income
//! categories.

pub mod degradation;
pub mod figure;
pub mod mode_choice;
pub mod route_network;
pub mod service_quality;
pub mod station_map;
pub mod template;
pub mod wfh;

use crate::catchment::IncomeCategory;

pub(crate) const NEUTRAL_GRAY: &str = "#95a5a6";
pub(crate) const SLATE_GRAY: &str = "#7f8c8d";
pub(crate) const LOW_INCOME_RED: &str = "#e74c3c";
pub(crate) const NON_LOW_INCOME_SLATE: &str = "#2c3e50";
pub(crate) const ROUTE_ORANGE: &str = "rgba(255, 165, 0, 0.7)";

pub(crate) fn income_color(category: IncomeCategory) -> &'static str {
    match category {
        IncomeCategory::LowIncome => LOW_INCOME_RED,
        IncomeCategory::NonLowIncome => NON_LOW_INCOME_SLATE,
    }
}
