//! Ledger counters, exported through `OpenTelemetry` when the `metrics`
//! feature is enabled. Without it these are no-ops.

#[cfg(feature = "metrics")]
mod otel {
    use std::sync::OnceLock;

    use opentelemetry::global;
    use opentelemetry::metrics::Counter;

    pub struct Counters {
        pub scans_accepted: Counter<u64>,
        pub scans_rejected: Counter<u64>,
        pub redemptions: Counter<u64>,
    }

    pub fn counters() -> &'static Counters {
        static COUNTERS: OnceLock<Counters> = OnceLock::new();
        COUNTERS.get_or_init(|| {
            let meter = global::meter("ecobin-ledger");
            Counters {
                scans_accepted: meter
                    .u64_counter("ecobin.scans.accepted")
                    .with_description("Scans that awarded points")
                    .build(),
                scans_rejected: meter
                    .u64_counter("ecobin.scans.rejected")
                    .with_description("Scans rejected by code or cooldown checks")
                    .build(),
                redemptions: meter
                    .u64_counter("ecobin.redemptions")
                    .with_description("Coupons redeemed")
                    .build(),
            }
        })
    }
}

pub fn scan_accepted() {
    #[cfg(feature = "metrics")]
    otel::counters().scans_accepted.add(1, &[]);
}

pub fn scan_rejected(reason: &'static str) {
    #[cfg(feature = "metrics")]
    otel::counters()
        .scans_rejected
        .add(1, &[opentelemetry::KeyValue::new("reason", reason)]);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

pub fn redemption(coupon_id: &str) {
    #[cfg(feature = "metrics")]
    otel::counters().redemptions.add(
        1,
        &[opentelemetry::KeyValue::new("coupon_id", coupon_id.to_string())],
    );
    #[cfg(not(feature = "metrics"))]
    let _ = coupon_id;
}
