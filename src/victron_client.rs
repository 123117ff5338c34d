//! Live connection to a Victron device over Bluetooth Low Energy.
//!
//! Victron devices expose a vendor service with three characteristics: a control
//! characteristic commands are written to, and two notifying characteristics. The
//! "single" characteristic mostly carries one record per notification, the "bulk"
//! characteristic carries a record stream split across notifications at arbitrary
//! points. Each notifying characteristic gets its own [`Reassembler`].
//!
//! The device only starts sending after an init sequence has been written, and stops
//! again unless it is pinged now and then.

use anyhow::anyhow;
use bluest::Adapter;
use bluest::AdvertisingDevice;
use bluest::Characteristic;
use bluest::Device;
use bluest::Service;
use bluest::Uuid;
use futures_util::stream;
use futures_util::StreamExt;
use tokio::time::timeout;
use tokio::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::RegistryError;
use crate::reassembler::{Reassembler, Sink};
use crate::registry::{DeviceModel, Registry};
use crate::shunt_characteristics;

/// Where a command is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Control,
    Single,
}

/// Which characteristic a notification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Single,
    Bulk,
}

/// Decoding state that lives as long as one connection
#[derive(Debug)]
struct ConnectionState {
    single: Reassembler,
    bulk: Reassembler,
    /// Whether the init sequence was written on this connection
    streaming: bool,
}

impl ConnectionState {
    fn new(device_id: &str, registry: &'static Registry) -> Result<Self, RegistryError> {
        Ok(Self {
            single: Reassembler::new(device_id, registry)?,
            bulk: Reassembler::new(device_id, registry)?,
            streaming: false,
        })
    }

    fn feed<S: Sink + ?Sized>(&mut self, channel: Channel, data: &[u8], sink: &mut S) -> usize {
        match channel {
            Channel::Single => self.single.feed(data, sink),
            Channel::Bulk => self.bulk.feed(data, sink),
        }
    }

    /// Forget everything received on the previous connection
    fn reset(&mut self) {
        self.single.clear();
        self.bulk.clear();
        self.streaming = false;
    }
}

pub struct VictronClient {
    adapter: Adapter,
    device: Device,
    name: String,
    state: ConnectionState,
    control: Characteristic,
    single: Characteristic,
    bulk: Characteristic,
}

impl VictronClient {
    const VICTRON_SERVICE_ID: Uuid = Uuid::from_u128(0x306b0001_b081_4037_83dc_e59fcc3cdfd0);
    const CONTROL_CHARACTERISTIC_ID: Uuid = Uuid::from_u128(0x306b0002_b081_4037_83dc_e59fcc3cdfd0);
    const SINGLE_CHARACTERISTIC_ID: Uuid = Uuid::from_u128(0x306b0003_b081_4037_83dc_e59fcc3cdfd0);
    const BULK_CHARACTERISTIC_ID: Uuid = Uuid::from_u128(0x306b0004_b081_4037_83dc_e59fcc3cdfd0);
    // Written once after subscribing. Makes the device start streaming voltage, current
    // and power.
    const INIT_SEQUENCE: &'static [(Target, &'static [u8])] = &[
        (Target::Control, &[0xfa, 0x80, 0xff]),
        (Target::Control, &[0xf9, 0x80]),
        (Target::Single, &[0x01]),
        (Target::Single, &[0x03, 0x00]),
        (
            Target::Single,
            &[0x06, 0x00, 0x82, 0x18, 0x93, 0x42, 0x10, 0x27, 0x03, 0x01, 0x03, 0x03],
        ),
        (Target::Control, &[0xf9, 0x41]),
    ];
    const KEEP_ALIVE: &'static [(Target, &'static [u8])] =
        &[(Target::Single, &[0x03, 0x00]), (Target::Control, &[0xf9, 0x41])];
    // Pause between writes of the init sequence
    const INIT_WRITE_DELAY: Duration = Duration::from_secs(1);
    const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);
    /// Without notifications for this long the device is pinged
    pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);
    /// Without notifications for this long despite pinging, the device is considered gone
    pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(60);

    /// Disconnect from the device. Bytes of a record that was still incomplete are
    /// discarded with the client.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        debug!(
            "{}: discarding {} single and {} bulk bytes",
            self.name,
            self.state.single.pending().len(),
            self.state.bulk.pending().len()
        );
        self.state.reset();
        self.adapter.disconnect_device(&self.device).await?;
        info!("{}: disconnected", self.name);
        Ok(())
    }

    /// Create a new `VictronClient`, which includes attempting to discover and connect to
    /// the device. `model` selects the field tables used to decode its records.
    pub async fn new(ble_device_name: &str, model: DeviceModel) -> anyhow::Result<Self> {
        let state = ConnectionState::new(ble_device_name, Registry::for_model(model))?;

        let adapter = bluest::Adapter::default()
            .await
            .ok_or(anyhow!("Default adapter not found"))?;
        adapter.wait_available().await?;

        let device = timeout(Self::DISCOVERY_TIMEOUT, Self::discover_device(ble_device_name, &adapter))
            .await
            .map_err(|_| anyhow!("Device not found"))??;

        info!("{ble_device_name}: connecting");
        adapter.connect_device(&device.device).await?;

        let victron_service = device
            .device
            .discover_services_with_uuid(Self::VICTRON_SERVICE_ID)
            .await?
            .first()
            .ok_or(anyhow!("The specified device does not support the Victron service. Is it paired?"))?
            .clone();
        let control = Self::characteristic(&victron_service, Self::CONTROL_CHARACTERISTIC_ID, "control").await?;
        let single = Self::characteristic(&victron_service, Self::SINGLE_CHARACTERISTIC_ID, "single value").await?;
        let bulk = Self::characteristic(&victron_service, Self::BULK_CHARACTERISTIC_ID, "bulk value").await?;

        Ok(Self {
            adapter: adapter.clone(),
            device: device.device,
            name: ble_device_name.to_owned(),
            state,
            control,
            single,
            bulk,
        })
    }

    /// Collect values from the device for `duration`, passing each one to `sink` as soon as
    /// it is decoded.
    ///
    /// Returns the number of values emitted. Decoding problems are reported to the sink and
    /// never end the session; transport errors do. A record split across the end of one
    /// call is completed by the next one on the same connection.
    pub async fn read_for<S: Sink + ?Sized>(&mut self, duration: Duration, sink: &mut S) -> anyhow::Result<usize> {
        self.reconnect_if_needed().await?;

        let single = self.single.notify().await?.map(|data| (Channel::Single, data));
        let bulk = self.bulk.notify().await?.map(|data| (Channel::Bulk, data));
        let mut notifications = stream::select(single, bulk);
        debug!("{}: notifications enabled", self.name);

        if !self.state.streaming {
            self.write_all(Self::INIT_SEQUENCE, Self::INIT_WRITE_DELAY).await?;
            self.state.streaming = true;
        }

        let deadline = Instant::now() + duration;
        let mut last_notification = Instant::now();
        let mut emitted = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(emitted);
            }

            match timeout(remaining.min(Self::KEEP_ALIVE_INTERVAL), notifications.next()).await {
                Err(_) => {
                    if last_notification.elapsed() >= Self::NOTIFICATION_TIMEOUT {
                        return Err(anyhow!("{}: no notifications for {:?}", self.name, Self::NOTIFICATION_TIMEOUT));
                    }
                    if Instant::now() < deadline {
                        debug!("{}: send ping", self.name);
                        self.write_all(Self::KEEP_ALIVE, Duration::ZERO).await?;
                    }
                }
                Ok(None) => {
                    info!("{}: end of notification stream", self.name);
                    return Err(anyhow!("end of notification stream"));
                }
                Ok(Some((channel, Ok(data)))) => {
                    trace!("{}: RX {channel:?} notification: 0x{}", self.name, hex::encode(&data));
                    last_notification = Instant::now();
                    emitted += self.state.feed(channel, &data, sink);
                }
                Ok(Some((channel, Err(err)))) => {
                    warn!("{}: {channel:?} notification error: {err}", self.name);
                    return Err(err.into());
                }
            }
        }
    }

    /// Read the SmartShunt's per-value characteristics once each, passing the values to
    /// `sink`. This works without the init sequence and leaves the record stream alone.
    ///
    /// Returns the number of values emitted.
    pub async fn read_characteristics<S: Sink + ?Sized>(&mut self, sink: &mut S) -> anyhow::Result<usize> {
        self.reconnect_if_needed().await?;

        let service = self
            .device
            .discover_services_with_uuid(shunt_characteristics::SERVICE_ID)
            .await?
            .first()
            .ok_or(anyhow!("The specified device does not support the SmartShunt value service."))?
            .clone();

        let keep_alive = Self::characteristic(&service, shunt_characteristics::KEEP_ALIVE_ID, "keep-alive").await?;
        debug!("{}: TX keep-alive: {}", self.name, hex::encode(shunt_characteristics::KEEP_ALIVE_FOREVER));
        keep_alive.write(&shunt_characteristics::KEEP_ALIVE_FOREVER).await?;

        let mut emitted = 0;
        for entry in shunt_characteristics::SMARTSHUNT {
            let characteristic = Self::characteristic(&service, entry.uuid, entry.field.label).await?;
            let data = characteristic.read().await?;
            trace!("{}: RX {}: 0x{}", self.name, entry.uuid, hex::encode(&data));
            let value = entry.decode(&data);
            debug!("{}: collected {} -> {}{}", self.name, value.label, value.value, value.unit);
            sink.emit(&self.name, value);
            emitted += 1;
        }
        info!("{}: gathering data successful", self.name);
        Ok(emitted)
    }

    async fn discover_device(name: &str, adapter: &Adapter) -> anyhow::Result<AdvertisingDevice> {
        // Victron devices don't advertise their service, so scan for everything
        let mut adapter_events = adapter.scan(&[]).await?;
        while let Some(device) = timeout(Self::DISCOVERY_TIMEOUT, adapter_events.next())
            .await
            .map_err(|_| anyhow!("Device not found"))?
        {
            let device_name = device.device.name_async().await?;
            if device_name == name {
                debug!("{name}: found, rssi {:?}", device.rssi);
                return Ok(device);
            }
        }

        Err(anyhow!("Device not found"))
    }

    async fn characteristic(service: &Service, uuid: Uuid, role: &str) -> anyhow::Result<Characteristic> {
        let characteristic = service
            .discover_characteristics_with_uuid(uuid)
            .await?
            .first()
            .ok_or(anyhow!("The specified device does not support the Victron {role} characteristic."))?
            .clone();
        Ok(characteristic)
    }

    async fn write_all(&self, commands: &[(Target, &[u8])], delay: Duration) -> anyhow::Result<()> {
        for (target, data) in commands {
            let characteristic = match target {
                Target::Control => &self.control,
                Target::Single => &self.single,
            };
            debug!("{}: TX {target:?}: {}", self.name, hex::encode(data));
            characteristic.write(data).await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    /// A new connection starts with empty buffers and needs the init sequence again.
    async fn reconnect_if_needed(&mut self) -> anyhow::Result<()> {
        if self.try_connect().await? {
            info!("{}: reconnected", self.name);
            self.state.reset();
        }
        Ok(())
    }

    /// Returns whether a new connection had to be made
    async fn try_connect(&self) -> anyhow::Result<bool> {
        if !self.device.is_connected().await {
            let mut retries = 2;
            loop {
                match self.adapter.connect_device(&self.device).await {
                    Ok(()) => return Ok(true),
                    Err(err) if retries > 0 => {
                        warn!("{}: Failed to connect: {err}", self.name);
                        retries -= 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        Ok(false)
    }
}

#[test]
fn test_characteristic_ids() {
    assert_eq!(
        VictronClient::VICTRON_SERVICE_ID.to_string(),
        "306b0001-b081-4037-83dc-e59fcc3cdfd0"
    );
    assert_eq!(
        VictronClient::BULK_CHARACTERISTIC_ID.to_string(),
        "306b0004-b081-4037-83dc-e59fcc3cdfd0"
    );
}

#[cfg(test)]
fn shunt_state() -> ConnectionState {
    ConnectionState::new("shunt", Registry::for_model(DeviceModel::Smartshunt)).unwrap()
}

#[test]
fn test_record_split_across_reads_is_kept() {
    use crate::field::DecodedValue;

    let mut state = shunt_state();
    let mut values = Vec::new();

    // first read ends in the middle of a bulk record
    state.feed(Channel::Bulk, &hex::decode("080319ed8e42f3ff080319ed8c44").unwrap(), &mut values);
    assert_eq!(values, vec![DecodedValue::new("Power", "W", "-13.0")]);

    // the next read starts with a single value notification, then the rest of the record
    state.feed(Channel::Single, &hex::decode("080319ed8d422f05").unwrap(), &mut values);
    state.feed(Channel::Bulk, &hex::decode("46fcffff").unwrap(), &mut values);
    assert_eq!(
        values,
        vec![
            DecodedValue::new("Power", "W", "-13.0"),
            DecodedValue::new("Voltage", "V", "13.27"),
            DecodedValue::new("Current", "A", "-0.954"),
        ]
    );
    assert!(state.bulk.pending().is_empty());
}

#[test]
fn test_reset_forgets_connection() {
    let mut state = shunt_state();
    let mut values = Vec::new();
    state.streaming = true;
    state.feed(Channel::Bulk, &hex::decode("080319ed8c44").unwrap(), &mut values);
    state.feed(Channel::Single, &hex::decode("0803").unwrap(), &mut values);

    state.reset();
    assert!(state.single.pending().is_empty());
    assert!(state.bulk.pending().is_empty());
    assert!(!state.streaming);

    state.feed(Channel::Bulk, &hex::decode("46fcffff").unwrap(), &mut values);
    assert!(values.is_empty());
}

#[test]
fn test_init_sequence_ends_with_ping() {
    let last = VictronClient::INIT_SEQUENCE.last().unwrap();
    assert!(VictronClient::KEEP_ALIVE.contains(last));
}
