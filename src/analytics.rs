use chrono::{Datelike, NaiveDate};

use crate::ledger::costing;
use crate::ledger::{Lot, Transaction};

#[derive(Clone, Debug, PartialEq)]
pub struct StockSummary {
    pub grams_on_hand: f64,
    pub fifo_value: f64,
    pub open_lots: usize,
}

pub fn stock_summary(lots: &[Lot]) -> StockSummary {
    StockSummary {
        grams_on_hand: lots.iter().map(|lot| lot.remaining_quantity).sum(),
        fifo_value: lots.iter().map(|lot| lot.value()).sum(),
        open_lots: lots.iter().filter(|lot| lot.is_open()).count(),
    }
}

// unsold grams bucketed by how long they have been on the shelf
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StockAging {
    pub days_0_to_7: f64,
    pub days_8_to_15: f64,
    pub days_16_to_30: f64,
    pub days_over_30: f64,
    pub weighted_avg_days: f64,
}

pub fn stock_aging(lots: &[Lot], as_of: NaiveDate) -> StockAging {
    let mut aging = StockAging::default();
    let mut age_weight = 0.0;
    let mut total = 0.0;

    for lot in lots.iter().filter(|lot| lot.is_open()) {
        let age = (as_of - lot.date).num_days().max(0) as f64;
        let grams = lot.remaining_quantity;

        if age <= 7.0 {
            aging.days_0_to_7 += grams;
        } else if age <= 15.0 {
            aging.days_8_to_15 += grams;
        } else if age <= 30.0 {
            aging.days_16_to_30 += grams;
        } else {
            aging.days_over_30 += grams;
        }

        age_weight += age * grams;
        total += grams;
    }

    if total > 0.0 {
        aging.weighted_avg_days = age_weight / total;
    }
    aging
}

#[derive(Clone, Debug, PartialEq)]
pub struct CustomerStat {
    pub name: String,
    pub tx_count: usize,
    pub total_grams: f64,
    pub total_spend: f64,
    pub profit_contribution: f64,
    pub margin_pct: f64,
    pub avg_qty_per_tx: f64,
    pub avg_selling_price: f64,
    pub avg_profit_per_gram: f64,
    pub pattern: String,
}

pub fn customer_stats(transactions: &[Transaction]) -> Vec<CustomerStat> {
    let mut stats: Vec<CustomerStat> = Vec::new();

    for txn in transactions.iter().filter(|txn| txn.is_sale()) {
        let index = stats
            .iter()
            .position(|stat| stat.name == txn.party_name)
            .unwrap_or_else(|| {
                stats.push(CustomerStat {
                    name: txn.party_name.clone(),
                    tx_count: 0,
                    total_grams: 0.0,
                    total_spend: 0.0,
                    profit_contribution: 0.0,
                    margin_pct: 0.0,
                    avg_qty_per_tx: 0.0,
                    avg_selling_price: 0.0,
                    avg_profit_per_gram: 0.0,
                    pattern: String::new(),
                });
                stats.len() - 1
            });
        let stat = &mut stats[index];
        stat.tx_count += 1;
        stat.total_grams += txn.quantity;
        stat.total_spend += txn.revenue_basis();
        stat.profit_contribution += txn.profit.unwrap_or(0.0);
    }

    for stat in stats.iter_mut() {
        if stat.total_spend > 0.0 {
            stat.margin_pct = stat.profit_contribution / stat.total_spend * 100.0;
        }
        stat.avg_qty_per_tx = stat.total_grams / stat.tx_count as f64;
        if stat.total_grams > 0.0 {
            stat.avg_selling_price = stat.total_spend / stat.total_grams;
            stat.avg_profit_per_gram = stat.profit_contribution / stat.total_grams;
        }
        stat.pattern = behaviour_pattern(stat);
    }

    stats.sort_by(|a, b| {
        b.profit_contribution
            .partial_cmp(&a.profit_contribution)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    stats
}

fn behaviour_pattern(stat: &CustomerStat) -> String {
    let mut pattern = if stat.avg_qty_per_tx > 100.0 {
        "Bulk Buyer".to_string()
    } else if stat.tx_count > 5 {
        "Frequent".to_string()
    } else {
        "Regular".to_string()
    };

    if stat.margin_pct < 0.5 {
        pattern.push_str(" (Price Sensitive)");
    } else if stat.margin_pct > 2.0 {
        pattern.push_str(" (High Margin)");
    }
    pattern
}

#[derive(Clone, Debug, PartialEq)]
pub struct SupplierStat {
    pub name: String,
    pub tx_count: usize,
    pub total_grams_purchased: f64,
    pub avg_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub rate_volatility: f64,
}

pub fn supplier_stats(transactions: &[Transaction]) -> Vec<SupplierStat> {
    let mut rates: Vec<(String, Vec<f64>, f64, f64)> = Vec::new();

    for txn in transactions.iter().filter(|txn| txn.is_purchase()) {
        let index = rates
            .iter()
            .position(|entry| entry.0 == txn.party_name)
            .unwrap_or_else(|| {
                rates.push((txn.party_name.clone(), Vec::new(), 0.0, 0.0));
                rates.len() - 1
            });
        let entry = &mut rates[index];
        entry.1.push(txn.unit_rate);
        entry.2 += txn.quantity;
        entry.3 += txn.quantity * txn.unit_rate;
    }

    let mut stats: Vec<SupplierStat> = rates
        .into_iter()
        .map(|(name, rates, grams, spend)| {
            let min_rate = rates.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_rate = rates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            SupplierStat {
                name,
                tx_count: rates.len(),
                total_grams_purchased: grams,
                // paid rate weighted by grams, not a plain mean of invoices
                avg_rate: if grams > 0.0 { spend / grams } else { 0.0 },
                min_rate,
                max_rate,
                rate_volatility: std_deviation(&rates),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.total_grams_purchased
            .partial_cmp(&a.total_grams_purchased)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    stats
}

fn std_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnoverStats {
    pub total_cogs: f64,
    pub turnover_ratio: f64,
    pub avg_days_to_sell: f64,
}

pub fn turnover_stats(transactions: &[Transaction], lots: &[Lot]) -> TurnoverStats {
    let total_cogs: f64 = transactions
        .iter()
        .filter_map(|txn| txn.cost_of_goods_sold)
        .sum();
    let stock_value: f64 = lots.iter().map(|lot| lot.value()).sum();

    // days from purchase to close, weighted by lot size; open lots have no
    // sell-through yet and are left out
    let mut day_weight = 0.0;
    let mut closed_grams = 0.0;
    for lot in lots {
        if let Some(closed) = lot.closed_date {
            let held = (closed - lot.date).num_days().max(0) as f64;
            day_weight += held * lot.original_quantity;
            closed_grams += lot.original_quantity;
        }
    }

    TurnoverStats {
        total_cogs,
        turnover_ratio: if stock_value > 0.0 {
            total_cogs / stock_value
        } else {
            0.0
        },
        avg_days_to_sell: if closed_grams > 0.0 {
            day_weight / closed_grams
        } else {
            0.0
        },
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyPerformance {
    pub year: i32,
    pub month: u32,
    pub turnover: f64,
    pub profit: f64,
    pub grams_sold: f64,
}

impl MonthlyPerformance {
    pub fn margin_pct(&self) -> f64 {
        if self.turnover > 0.0 {
            self.profit / self.turnover * 100.0
        } else {
            0.0
        }
    }
}

// lifetime sales rolled up per calendar month, newest month first
pub fn monthly_performance(transactions: &[Transaction]) -> Vec<MonthlyPerformance> {
    let mut months: Vec<MonthlyPerformance> = Vec::new();

    for txn in transactions.iter().filter(|txn| txn.is_sale()) {
        let (year, month) = (txn.date.year(), txn.date.month());
        let index = months
            .iter()
            .position(|m| m.year == year && m.month == month)
            .unwrap_or_else(|| {
                months.push(MonthlyPerformance {
                    year,
                    month,
                    turnover: 0.0,
                    profit: 0.0,
                    grams_sold: 0.0,
                });
                months.len() - 1
            });
        let entry = &mut months[index];
        entry.turnover += txn.revenue_basis();
        entry.profit += txn.profit.unwrap_or(0.0);
        entry.grams_sold += txn.quantity;
    }

    months.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
    months
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlertSeverity {
    High,
    Medium,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RiskAlert {
    pub severity: AlertSeverity,
    pub context: &'static str,
    pub message: String,
}

pub fn risk_alerts(transactions: &[Transaction], lots: &[Lot], as_of: NaiveDate) -> Vec<RiskAlert> {
    let mut alerts = Vec::new();

    let aging = stock_aging(lots, as_of);
    if aging.days_over_30 > 0.0 {
        alerts.push(RiskAlert {
            severity: AlertSeverity::High,
            context: "Inventory",
            message: format!(
                "{:.3} g of gold is older than 30 days",
                aging.days_over_30
            ),
        });
    }

    // margin across the five most recent sales
    let recent: Vec<&Transaction> = transactions
        .iter()
        .rev()
        .filter(|txn| txn.is_sale())
        .take(5)
        .collect();
    if !recent.is_empty() {
        let profit: f64 = recent.iter().map(|txn| txn.profit.unwrap_or(0.0)).sum();
        let revenue: f64 = recent.iter().map(|txn| txn.revenue_basis()).sum();
        if revenue > 0.0 && profit / revenue < 0.005 {
            alerts.push(RiskAlert {
                severity: AlertSeverity::Medium,
                context: "Profit",
                message: "recent sales margins are critically low (under 0.5%)".to_string(),
            });
        }
    }

    alerts
}

#[derive(Clone, Debug, PartialEq)]
pub struct DailyProfit {
    pub date: NaiveDate,
    pub profit: f64,
    pub profit_per_gram: f64,
}

pub fn profit_by_day(
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyProfit> {
    let mut days = Vec::new();
    let mut date = start;
    while date <= end {
        let mut profit = 0.0;
        let mut grams = 0.0;
        for txn in transactions
            .iter()
            .filter(|txn| txn.is_sale() && txn.date == date)
        {
            profit += txn.profit.unwrap_or(0.0);
            grams += txn.quantity;
        }
        days.push(DailyProfit {
            date,
            profit,
            profit_per_gram: if grams > 0.0 { profit / grams } else { 0.0 },
        });
        date = date + chrono::Duration::days(1);
    }
    days
}

// value of stock on hand at the end of a past day, rebuilt by replaying the
// history up to that date
pub fn inventory_value_on(transactions: &[Transaction], date: NaiveDate, epsilon: f64) -> f64 {
    let prefix: Vec<Transaction> = transactions
        .iter()
        .filter(|txn| txn.date <= date)
        .cloned()
        .collect();
    costing::recompute(prefix, epsilon)
        .lots
        .iter()
        .map(|lot| lot.value())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::costing::DEFAULT_QUANTITY_EPSILON;
    use crate::ledger::TransactionKind;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn txn(
        id: &str,
        kind: TransactionKind,
        date: NaiveDate,
        party: &str,
        quantity: f64,
        rate: f64,
        profit: Option<f64>,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind,
            date,
            party_name: party.to_string(),
            quantity,
            unit_rate: rate,
            taxable_amount: quantity * rate,
            tax_amount: 0.0,
            total_amount: quantity * rate,
            cost_of_goods_sold: profit.map(|p| quantity * rate - p),
            profit,
        }
    }

    fn lot(id: &str, date: NaiveDate, original: f64, remaining: f64, cost: f64) -> Lot {
        Lot {
            id: id.to_string(),
            date,
            original_quantity: original,
            remaining_quantity: remaining,
            cost_per_unit: cost,
            closed_date: None,
            total_revenue_allocated: 0.0,
        }
    }

    #[test]
    fn aging_buckets_weight_by_remaining_grams() {
        let lots = vec![
            lot("p1", day(1), 10.0, 4.0, 100.0),
            lot("p2", day(10), 10.0, 6.0, 100.0),
        ];
        let aging = stock_aging(&lots, day(14));

        // p1 is 13 days old, p2 is 4 days old
        assert_eq!(aging.days_0_to_7, 6.0);
        assert_eq!(aging.days_8_to_15, 4.0);
        assert_eq!(aging.days_16_to_30, 0.0);
        assert_eq!(aging.days_over_30, 0.0);
        assert!((aging.weighted_avg_days - (13.0 * 4.0 + 4.0 * 6.0) / 10.0).abs() < 1e-9);
    }

    #[test]
    fn closed_lots_are_left_out_of_aging() {
        let mut closed = lot("p1", day(1), 10.0, 0.0, 100.0);
        closed.closed_date = Some(day(2));
        let aging = stock_aging(&[closed], day(20));
        assert_eq!(aging, StockAging::default());
    }

    #[test]
    fn customer_stats_aggregate_sales_per_party() {
        let transactions = vec![
            txn("s1", TransactionKind::Sale, day(1), "Mehta", 10.0, 100.0, Some(30.0)),
            txn("s2", TransactionKind::Sale, day(2), "Mehta", 20.0, 110.0, Some(50.0)),
            txn("s3", TransactionKind::Sale, day(2), "Shah", 5.0, 120.0, Some(2.0)),
            txn("p1", TransactionKind::Purchase, day(1), "Refiner", 50.0, 90.0, None),
        ];

        let stats = customer_stats(&transactions);
        assert_eq!(stats.len(), 2);

        let mehta = &stats[0];
        assert_eq!(mehta.name, "Mehta");
        assert_eq!(mehta.tx_count, 2);
        assert_eq!(mehta.total_grams, 30.0);
        assert_eq!(mehta.total_spend, 3200.0);
        assert_eq!(mehta.profit_contribution, 80.0);
        assert_eq!(mehta.avg_qty_per_tx, 15.0);
        assert_eq!(mehta.pattern, "Regular (High Margin)");

        let shah = &stats[1];
        assert_eq!(shah.name, "Shah");
        assert_eq!(shah.pattern, "Regular (Price Sensitive)");
    }

    #[test]
    fn bulk_buyers_are_flagged() {
        let transactions = vec![txn(
            "s1",
            TransactionKind::Sale,
            day(1),
            "Mehta",
            150.0,
            100.0,
            Some(150.0),
        )];
        let stats = customer_stats(&transactions);
        assert_eq!(stats[0].pattern, "Bulk Buyer");
    }

    #[test]
    fn supplier_stats_track_rate_spread() {
        let transactions = vec![
            txn("p1", TransactionKind::Purchase, day(1), "Refiner", 10.0, 100.0, None),
            txn("p2", TransactionKind::Purchase, day(2), "Refiner", 30.0, 120.0, None),
        ];

        let stats = supplier_stats(&transactions);
        assert_eq!(stats.len(), 1);
        let refiner = &stats[0];
        assert_eq!(refiner.tx_count, 2);
        assert_eq!(refiner.total_grams_purchased, 40.0);
        assert_eq!(refiner.avg_rate, (10.0 * 100.0 + 30.0 * 120.0) / 40.0);
        assert_eq!(refiner.min_rate, 100.0);
        assert_eq!(refiner.max_rate, 120.0);
        assert_eq!(refiner.rate_volatility, 10.0);
    }

    #[test]
    fn monthly_performance_groups_by_calendar_month() {
        let transactions = vec![
            txn("s1", TransactionKind::Sale, day(5), "Mehta", 10.0, 100.0, Some(20.0)),
            txn("s2", TransactionKind::Sale, day(20), "Shah", 10.0, 100.0, Some(30.0)),
            txn(
                "s3",
                TransactionKind::Sale,
                NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                "Mehta",
                5.0,
                100.0,
                Some(10.0),
            ),
        ];

        let months = monthly_performance(&transactions);
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].year, months[0].month), (2024, 4));
        assert_eq!(months[1].turnover, 2000.0);
        assert_eq!(months[1].profit, 50.0);
        assert_eq!(months[1].grams_sold, 20.0);
        assert!((months[1].margin_pct() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn aged_stock_raises_a_high_alert() {
        let lots = vec![lot("p1", day(1), 10.0, 8.0, 100.0)];
        let alerts = risk_alerts(&[], &lots, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
        assert_eq!(alerts[0].context, "Inventory");
    }

    #[test]
    fn thin_recent_margins_raise_a_medium_alert() {
        let transactions = vec![
            txn("s1", TransactionKind::Sale, day(1), "Mehta", 10.0, 100.0, Some(1.0)),
            txn("s2", TransactionKind::Sale, day(2), "Mehta", 10.0, 100.0, Some(2.0)),
        ];
        let alerts = risk_alerts(&transactions, &[], day(3));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Medium);
    }

    #[test]
    fn inventory_value_on_replays_only_the_prefix() {
        let transactions = vec![
            txn("p1", TransactionKind::Purchase, day(1), "Refiner", 10.0, 100.0, None),
            txn("s1", TransactionKind::Sale, day(3), "Mehta", 4.0, 150.0, None),
            txn("p2", TransactionKind::Purchase, day(5), "Refiner", 10.0, 200.0, None),
        ];

        let value_day_2 = inventory_value_on(&transactions, day(2), DEFAULT_QUANTITY_EPSILON);
        assert_eq!(value_day_2, 1000.0);

        let value_day_4 = inventory_value_on(&transactions, day(4), DEFAULT_QUANTITY_EPSILON);
        assert_eq!(value_day_4, 600.0);

        let value_day_6 = inventory_value_on(&transactions, day(6), DEFAULT_QUANTITY_EPSILON);
        assert_eq!(value_day_6, 2600.0);
    }

    #[test]
    fn profit_by_day_covers_the_whole_range() {
        let transactions = vec![txn(
            "s1",
            TransactionKind::Sale,
            day(2),
            "Mehta",
            10.0,
            100.0,
            Some(40.0),
        )];
        let days = profit_by_day(&transactions, day(1), day(3));
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].profit, 0.0);
        assert_eq!(days[1].profit, 40.0);
        assert_eq!(days[1].profit_per_gram, 4.0);
        assert_eq!(days[2].profit, 0.0);
    }
}
