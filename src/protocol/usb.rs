//! USB enumeration payload.

use serde::Deserialize;

/// One entry of `DumpUsbResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsbDeviceData {
    pub device_name: String,
    pub manufacturer_name: String,
    pub product_name: String,
    pub version: String,
    pub serial_number: String,
    pub device_id: i32,
    pub vendor_id: i32,
    pub product_id: i32,
    pub device_class: i32,
    pub device_subclass: i32,
    pub protocol: i32,
}

impl UsbDeviceData {
    /// `vvvv:pppp` in lowercase hex, as `lsusb` prints it.
    pub fn usb_id(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}
