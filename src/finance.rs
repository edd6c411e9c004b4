use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{STATUS_CANCELLED, STATUS_COMPLETED};

/// The slice of a booking row the aggregations need.
#[derive(Debug, Clone)]
pub struct BookingFigures {
    pub date: String,
    pub professional_id: String,
    pub professional_name: String,
    pub service_name: String,
    pub price: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodSummary {
    pub booking_count: usize,
    pub billed_count: usize,
    pub completed_count: usize,
    pub cancelled_count: usize,
    pub total_revenue: f64,
    pub average_ticket: f64,
    pub cancellation_rate: f64,
}

/// Revenue counts bookings that were not cancelled (the "billed" set, pending
/// and confirmed included); the average ticket is taken over the same set.
/// `completed_count` counts completed bookings only. Empty input yields
/// zeros, never NaN.
pub fn summarize(bookings: &[BookingFigures]) -> PeriodSummary {
    let booking_count = bookings.len();
    let cancelled_count = bookings
        .iter()
        .filter(|b| b.status == STATUS_CANCELLED)
        .count();
    let completed_count = bookings
        .iter()
        .filter(|b| b.status == STATUS_COMPLETED)
        .count();
    let billed: Vec<&BookingFigures> = bookings
        .iter()
        .filter(|b| b.status != STATUS_CANCELLED)
        .collect();
    let billed_count = billed.len();
    let total_revenue: f64 = billed.iter().map(|b| b.price).sum();
    let average_ticket = if billed_count > 0 {
        total_revenue / billed_count as f64
    } else {
        0.0
    };
    let cancellation_rate = if booking_count > 0 {
        cancelled_count as f64 / booking_count as f64 * 100.0
    } else {
        0.0
    };

    PeriodSummary {
        booking_count,
        billed_count,
        completed_count,
        cancelled_count,
        total_revenue,
        average_ticket,
        cancellation_rate,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RevenueBucket {
    pub label: String,
    pub revenue: f64,
    pub count: usize,
}

fn bucket_by<F>(bookings: &[BookingFigures], key: F) -> Vec<RevenueBucket>
where
    F: Fn(&BookingFigures) -> String,
{
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for booking in bookings.iter().filter(|b| b.status != STATUS_CANCELLED) {
        let entry = buckets.entry(key(booking)).or_insert((0.0, 0));
        entry.0 += booking.price;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(label, (revenue, count))| RevenueBucket {
            label,
            revenue,
            count,
        })
        .collect()
}

pub fn revenue_by_day(bookings: &[BookingFigures]) -> Vec<RevenueBucket> {
    bucket_by(bookings, |b| b.date.clone())
}

pub fn revenue_by_service(bookings: &[BookingFigures]) -> Vec<RevenueBucket> {
    bucket_by(bookings, |b| b.service_name.clone())
}

pub fn revenue_by_professional(bookings: &[BookingFigures]) -> Vec<RevenueBucket> {
    bucket_by(bookings, |b| b.professional_name.clone())
}

/// One professional's commission standing for a period.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommissionLine {
    pub professional_id: String,
    pub professional_name: String,
    pub commission_percent: f64,
    pub completed_count: usize,
    pub base_revenue: f64,
    pub earned: f64,
    pub paid: f64,
    pub balance: f64,
}

#[derive(Debug, Clone)]
pub struct ProfessionalRate {
    pub id: String,
    pub name: String,
    pub commission_percent: f64,
}

#[derive(Debug, Clone)]
pub struct PayoutFigures {
    pub professional_id: String,
    pub amount: f64,
}

/// Earned is computed over completed bookings only, with each professional's
/// current percentage. Paid sums the recorded payouts for the period.
pub fn commission_lines(
    professionals: &[ProfessionalRate],
    completed: &[BookingFigures],
    payouts: &[PayoutFigures],
) -> Vec<CommissionLine> {
    professionals
        .iter()
        .map(|professional| {
            let own: Vec<&BookingFigures> = completed
                .iter()
                .filter(|b| b.professional_id == professional.id)
                .collect();
            let base_revenue: f64 = own.iter().map(|b| b.price).sum();
            let earned = base_revenue * professional.commission_percent / 100.0;
            let paid: f64 = payouts
                .iter()
                .filter(|p| p.professional_id == professional.id)
                .map(|p| p.amount)
                .sum();
            CommissionLine {
                professional_id: professional.id.clone(),
                professional_name: professional.name.clone(),
                commission_percent: professional.commission_percent,
                completed_count: own.len(),
                base_revenue,
                earned,
                paid,
                balance: earned - paid,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{STATUS_CANCELLED, STATUS_COMPLETED, STATUS_PENDING};

    fn booking(date: &str, professional: &str, service: &str, price: f64, status: &str) -> BookingFigures {
        BookingFigures {
            date: date.to_string(),
            professional_id: format!("id-{professional}"),
            professional_name: professional.to_string(),
            service_name: service.to_string(),
            price,
            status: status.to_string(),
        }
    }

    #[test]
    fn empty_period_yields_zeros() {
        let summary = summarize(&[]);
        assert_eq!(summary.booking_count, 0);
        assert_eq!(summary.total_revenue, 0.0);
        assert_eq!(summary.average_ticket, 0.0);
        assert_eq!(summary.cancellation_rate, 0.0);
        assert!(!summary.average_ticket.is_nan());
    }

    #[test]
    fn known_fixture_matches_expected_figures() {
        let bookings = vec![
            booking("2026-08-01", "Marco", "Cut", 50.0, STATUS_COMPLETED),
            booking("2026-08-02", "Marco", "Beard", 30.0, STATUS_COMPLETED),
            booking("2026-08-02", "Leo", "Cut", 20.0, STATUS_CANCELLED),
        ];
        let summary = summarize(&bookings);
        assert_eq!(summary.total_revenue, 80.0);
        assert_eq!(summary.average_ticket, 40.0);
        assert!((summary.cancellation_rate - 33.333).abs() < 0.01);
        assert_eq!(summary.billed_count, 2);
        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.cancelled_count, 1);
    }

    #[test]
    fn pending_bookings_bill_but_are_not_completed() {
        let bookings = vec![
            booking("2026-08-01", "Marco", "Cut", 40.0, STATUS_COMPLETED),
            booking("2026-08-02", "Marco", "Beard", 20.0, STATUS_PENDING),
            booking("2026-08-03", "Leo", "Cut", 10.0, STATUS_CANCELLED),
        ];
        let summary = summarize(&bookings);
        assert_eq!(summary.booking_count, 3);
        assert_eq!(summary.billed_count, 2);
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.total_revenue, 60.0);
        assert_eq!(summary.average_ticket, 30.0);
    }

    #[test]
    fn groupings_exclude_cancelled_and_are_ordered() {
        let bookings = vec![
            booking("2026-08-02", "Marco", "Cut", 50.0, STATUS_COMPLETED),
            booking("2026-08-01", "Marco", "Cut", 50.0, STATUS_COMPLETED),
            booking("2026-08-01", "Leo", "Beard", 30.0, STATUS_COMPLETED),
            booking("2026-08-01", "Leo", "Cut", 20.0, STATUS_CANCELLED),
        ];
        let by_day = revenue_by_day(&bookings);
        assert_eq!(
            by_day,
            vec![
                RevenueBucket {
                    label: "2026-08-01".to_string(),
                    revenue: 80.0,
                    count: 2
                },
                RevenueBucket {
                    label: "2026-08-02".to_string(),
                    revenue: 50.0,
                    count: 1
                },
            ]
        );

        let by_service = revenue_by_service(&bookings);
        assert_eq!(by_service[0].label, "Beard");
        assert_eq!(by_service[1].revenue, 100.0);

        let by_professional = revenue_by_professional(&bookings);
        assert_eq!(by_professional.len(), 2);
        assert_eq!(by_professional[1].label, "Marco");
    }

    #[test]
    fn commission_balance_subtracts_payouts() {
        let professionals = vec![
            ProfessionalRate {
                id: "id-Marco".to_string(),
                name: "Marco".to_string(),
                commission_percent: 40.0,
            },
            ProfessionalRate {
                id: "id-Leo".to_string(),
                name: "Leo".to_string(),
                commission_percent: 50.0,
            },
        ];
        let completed = vec![
            booking("2026-08-01", "Marco", "Cut", 100.0, STATUS_COMPLETED),
            booking("2026-08-02", "Marco", "Cut", 50.0, STATUS_COMPLETED),
            booking("2026-08-02", "Leo", "Beard", 80.0, STATUS_COMPLETED),
        ];
        let payouts = vec![PayoutFigures {
            professional_id: "id-Marco".to_string(),
            amount: 20.0,
        }];

        let lines = commission_lines(&professionals, &completed, &payouts);
        let marco = lines.iter().find(|l| l.professional_name == "Marco").unwrap();
        assert_eq!(marco.base_revenue, 150.0);
        assert_eq!(marco.earned, 60.0);
        assert_eq!(marco.paid, 20.0);
        assert_eq!(marco.balance, 40.0);

        let leo = lines.iter().find(|l| l.professional_name == "Leo").unwrap();
        assert_eq!(leo.earned, 40.0);
        assert_eq!(leo.paid, 0.0);
        assert_eq!(leo.balance, 40.0);
    }

    #[test]
    fn professional_without_bookings_gets_zero_line() {
        let professionals = vec![ProfessionalRate {
            id: "id-Nico".to_string(),
            name: "Nico".to_string(),
            commission_percent: 35.0,
        }];
        let lines = commission_lines(&professionals, &[], &[]);
        assert_eq!(lines[0].earned, 0.0);
        assert_eq!(lines[0].balance, 0.0);
    }
}
