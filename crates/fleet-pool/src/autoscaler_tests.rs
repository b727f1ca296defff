use super::*;
use fleet_core::FakeClock;
use parking_lot::Mutex as PLMutex;

struct MockPool {
    total: PLMutex<usize>,
    active: PLMutex<usize>,
    max: PLMutex<usize>,
}

impl MockPool {
    fn new(total: usize, active: usize, max: usize) -> Arc<Self> {
        Arc::new(Self { total: PLMutex::new(total), active: PLMutex::new(active), max: PLMutex::new(max) })
    }
}

#[async_trait]
impl PoolScaling for MockPool {
    fn pool_stats(&self) -> ScalingStats {
        let total = *self.total.lock();
        let active = *self.active.lock();
        ScalingStats { total, active, idle: total - active }
    }

    async fn grow_by(&self, n: usize) -> usize {
        *self.total.lock() += n;
        n
    }

    async fn shrink_by(&self, n: usize) -> usize {
        let mut total = self.total.lock();
        let removed = n.min(*total);
        *total -= removed;
        removed
    }

    fn set_max(&self, n: usize) {
        *self.max.lock() = n;
    }
}

#[tokio::test]
async fn scales_up_when_utilization_exceeds_threshold() {
    let clock = Arc::new(FakeClock::new());
    let config = AutoscalerConfig { scale_factor: 2.0, max: 100, ..AutoscalerConfig::default() };
    let autoscaler = Autoscaler::new(config, clock);
    let pool = MockPool::new(10, 9, 100);

    autoscaler.evaluate_once(pool.as_ref()).await;

    assert_eq!(*pool.total.lock(), 20);
    assert_eq!(autoscaler.history().len(), 1);
    assert!(autoscaler.history()[0].reason.contains("scale-up"));
}

#[tokio::test]
async fn scales_down_when_utilization_below_threshold() {
    let clock = Arc::new(FakeClock::new());
    let config =
        AutoscalerConfig { scale_factor: 2.0, min: 1, max: 100, ..AutoscalerConfig::default() };
    let autoscaler = Autoscaler::new(config, clock);
    let pool = MockPool::new(10, 1, 100);

    autoscaler.evaluate_once(pool.as_ref()).await;

    assert!(*pool.total.lock() < 10);
    assert!(autoscaler.history()[0].reason.contains("scale-down"));
}

#[tokio::test]
async fn scale_up_respects_max() {
    let clock = Arc::new(FakeClock::new());
    let config = AutoscalerConfig { max: 12, ..AutoscalerConfig::default() };
    let autoscaler = Autoscaler::new(config, clock);
    let pool = MockPool::new(10, 0, 12);

    let created = autoscaler.scale_up_by(100, pool.as_ref()).await;

    assert_eq!(created, 2);
    assert_eq!(*pool.total.lock(), 12);
}

#[tokio::test]
async fn scale_down_respects_min() {
    let clock = Arc::new(FakeClock::new());
    let config = AutoscalerConfig { min: 5, ..AutoscalerConfig::default() };
    let autoscaler = Autoscaler::new(config, clock);
    let pool = MockPool::new(10, 0, 32);

    let removed = autoscaler.scale_down_by(100, pool.as_ref()).await;

    assert_eq!(removed, 5);
    assert_eq!(*pool.total.lock(), 5);
}

#[tokio::test]
async fn cooldown_blocks_a_second_scale_up_within_the_window() {
    let clock = Arc::new(FakeClock::new());
    let config = AutoscalerConfig {
        scale_factor: 2.0,
        max: 1000,
        scale_up_cooldown: Duration::from_secs(60),
        ..AutoscalerConfig::default()
    };
    let autoscaler = Autoscaler::new(config, clock.clone());
    let pool = MockPool::new(10, 9, 1000);

    autoscaler.evaluate_once(pool.as_ref()).await;
    let after_first = *pool.total.lock();

    // Demand stays hot (utilization would again cross the threshold), but
    // the cooldown window hasn't elapsed yet.
    *pool.active.lock() = (after_first as f64 * 0.9) as usize;
    autoscaler.evaluate_once(pool.as_ref()).await;
    assert_eq!(*pool.total.lock(), after_first, "second evaluation within cooldown must be a no-op");

    clock.advance(Duration::from_secs(61));
    autoscaler.evaluate_once(pool.as_ref()).await;
    assert!(*pool.total.lock() > after_first, "cooldown elapsed, scaling should resume");
}

#[test]
fn history_is_bounded_to_the_last_100_actions() {
    let clock = Arc::new(FakeClock::new());
    let autoscaler = Autoscaler::new(AutoscalerConfig::default(), clock);
    for i in 0..150 {
        autoscaler.record(format!("action {i}"), i, i + 1);
    }
    assert_eq!(autoscaler.history().len(), 100);
    assert_eq!(autoscaler.history().first().unwrap().reason, "action 50");
}
