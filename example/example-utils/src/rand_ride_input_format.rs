use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::taxi_ride::TaxiRide;

const STATUSES: [&str; 3] = ["pickup", "enroute", "dropoff"];

/// Generates ride messages with slightly out-of-order event times, and now and then a broken one.
#[derive(Debug)]
pub struct RandRideIterator {
    rng: StdRng,
    remaining: usize,
    event_time: i64,
    point_idx: u64,
}

impl RandRideIterator {
    pub fn new(seed: u64, count: usize, start_millis: i64) -> Self {
        RandRideIterator {
            rng: StdRng::seed_from_u64(seed),
            remaining: count,
            event_time: start_millis,
            point_idx: 0,
        }
    }

    fn next_ride(&mut self) -> TaxiRide {
        // mostly forward, sometimes a little back in time
        self.event_time += self.rng.gen_range(-2_000i64..30_000i64);
        if self.rng.gen_ratio(1, 20) {
            // a quiet period long enough to end every session
            self.event_time += 180_000;
        }
        self.point_idx += 1;

        let timestamp = Utc
            .timestamp_millis_opt(self.event_time.max(0))
            .single()
            .unwrap_or_else(Utc::now);
        let status = STATUSES[self.rng.gen_range(0..STATUSES.len())];

        TaxiRide {
            ride_id: format!("ride-{}", self.rng.gen_range(0..50)),
            point_idx: self.point_idx,
            latitude: 40.7 + self.rng.gen_range(-0.1..0.1),
            longitude: -73.9 + self.rng.gen_range(-0.1..0.1),
            timestamp: timestamp.to_rfc3339(),
            meter_reading: self.rng.gen_range(0.0..60.0),
            meter_increment: 0.03,
            ride_status: status.to_string(),
            passenger_count: self.rng.gen_range(1..7),
        }
    }
}

impl Iterator for RandRideIterator {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        if self.rng.gen_ratio(1, 100) {
            return Some(b"{\"ride_id\": \"truncated".to_vec());
        }

        let ride = self.next_ride();
        match serde_json::to_vec(&ride) {
            Ok(payload) => Some(payload),
            Err(e) => Some(format!("unserializable ride. {}", e).into_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::rand_ride_input_format::RandRideIterator;
    use crate::taxi_ride::parse_ride;

    #[test]
    pub fn rand_ride_test() {
        let payloads: Vec<Vec<u8>> = RandRideIterator::new(1, 200, 0).collect();
        assert_eq!(payloads.len(), 200);

        let decoded = payloads
            .iter()
            .filter(|p| parse_ride(p.as_slice()).is_ok())
            .count();
        assert!(decoded > 150);
    }
}
