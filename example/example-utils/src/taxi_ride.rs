use chrono::DateTime;
use serde::{Deserialize, Serialize};
use sessionflow::api::element::Element;
use sessionflow::api::error::DecodeError;

/// One message of the public taxi-ride feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxiRide {
    pub ride_id: String,
    pub point_idx: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// RFC 3339, e.g. `2020-03-11T12:01:00.000-04:00`.
    pub timestamp: String,
    pub meter_reading: f64,
    pub meter_increment: f64,
    pub ride_status: String,
    pub passenger_count: i64,
}

impl TaxiRide {
    pub fn event_time(&self) -> Result<u64, DecodeError> {
        let date_time = DateTime::parse_from_rfc3339(self.timestamp.as_str()).map_err(|e| {
            DecodeError::new(format!("bad timestamp `{}`. {}", self.timestamp, e))
        })?;
        let millis = date_time.timestamp_millis();
        if millis < 0 {
            return Err(DecodeError::new(format!(
                "timestamp `{}` is before the epoch",
                self.timestamp
            )));
        }
        Ok(millis as u64)
    }
}

/// Decodes a raw ride message into `(ride_status, passenger_count)` at the ride's event time.
pub fn parse_ride(payload: &[u8]) -> Result<Element<String, i64>, DecodeError> {
    let ride: TaxiRide = serde_json::from_slice(payload)
        .map_err(|e| DecodeError::new(format!("malformed ride message. {}", e)))?;
    let event_time = ride.event_time()?;
    Ok(Element::new(ride.ride_status, ride.passenger_count, event_time))
}

#[cfg(test)]
mod tests {
    use crate::taxi_ride::parse_ride;

    #[test]
    pub fn parse_ride_test() {
        let payload = br#"{"ride_id":"r-1","point_idx":12,"latitude":40.7,"longitude":-73.9,
            "timestamp":"1970-01-01T00:02:00.000+00:00","meter_reading":8.5,
            "meter_increment":0.03,"ride_status":"pickup","passenger_count":2}"#;
        let element = parse_ride(payload).unwrap();
        assert_eq!(element.key, "pickup");
        assert_eq!(element.value, 2);
        assert_eq!(element.event_time, 120_000);
    }

    #[test]
    pub fn parse_malformed_ride_test() {
        assert!(parse_ride(b"{\"ride_id\":").is_err());

        let payload = br#"{"ride_id":"r-1","point_idx":12,"latitude":40.7,"longitude":-73.9,
            "timestamp":"yesterday","meter_reading":8.5,
            "meter_increment":0.03,"ride_status":"pickup","passenger_count":2}"#;
        let err = parse_ride(payload).unwrap_err();
        assert!(err.reason.contains("yesterday"));
    }
}
