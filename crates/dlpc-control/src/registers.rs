//! Controller register map.
//!
//! Most configuration registers have separate write and readback
//! addresses: a write lands at `write_addr`, the current value is reported
//! at `read_addr`.

/// Fixed 7-bit bus address of the controller (27 decimal).
pub const DEVICE_ADDRESS: u8 = 27;

/// One controller register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    /// `None` for read-only registers.
    pub write_addr: Option<u8>,
    pub read_addr: u8,
    /// Width in bytes.
    pub width: usize,
    /// Readback is known not to reflect a write immediately.
    pub stale_readback: bool,
}

/// Operating mode select.
pub const MODE: Register = Register {
    name: "operating_mode",
    write_addr: Some(0x05),
    read_addr: 0x06,
    width: 1,
    stale_readback: false,
};

/// Test pattern generator configuration.
pub const TEST_PATTERN: Register = Register {
    name: "test_pattern",
    write_addr: Some(0x0B),
    read_addr: 0x0C,
    width: 6,
    stale_readback: false,
};

/// External print configuration: `[degamma select, illuminator enable mask]`.
pub const EXTERNAL_PRINT_CONFIG: Register = Register {
    name: "external_print_config",
    write_addr: Some(0xA8),
    read_addr: 0xA9,
    width: 2,
    stale_readback: false,
};

/// External print layer control: `[print settings, dark hi, dark lo, exposed hi, exposed lo]`.
///
/// Writing this register starts an exposure.
pub const DARK_EXPOSED_FRAMES: Register = Register {
    name: "dark_exposed_frames",
    write_addr: Some(0xC1),
    read_addr: 0xC2,
    width: 5,
    stale_readback: false,
};

/// FPGA parallel video interface control.
pub const VIDEO_INTERFACE: Register = Register {
    name: "video_interface",
    write_addr: Some(0xC3),
    read_addr: 0xC4,
    width: 1,
    stale_readback: true,
};

/// Active image buffer index.
pub const ACTIVE_BUFFER: Register = Register {
    name: "active_buffer",
    write_addr: Some(0xC5),
    read_addr: 0xC6,
    width: 1,
    stale_readback: true,
};

/// FPGA control (only the low four bits are meaningful).
pub const FPGA_CONTROL: Register = Register {
    name: "fpga_control",
    write_addr: Some(0xCA),
    read_addr: 0xCB,
    width: 1,
    stale_readback: true,
};

/// CRC16 of the most recent image stream, low byte first.
pub const CRC_RESULT: Register = Register {
    name: "crc_result",
    write_addr: None,
    read_addr: 0xCE,
    width: 2,
    stale_readback: false,
};

/// FPGA control: CRC16 checking of the image stream.
pub const FPGA_CRC16_ENABLE: u8 = 1 << 2;

/// Video interface: parallel interface enable.
pub const VIDEO_INTERFACE_ENABLE: u8 = 1 << 0;

/// Every mapped register, in address order.
pub const ALL: [Register; 8] = [
    MODE,
    TEST_PATTERN,
    EXTERNAL_PRINT_CONFIG,
    DARK_EXPOSED_FRAMES,
    VIDEO_INTERFACE,
    ACTIVE_BUFFER,
    FPGA_CONTROL,
    CRC_RESULT,
];

/// Look up a register by its write or read address.
pub fn by_address(addr: u8) -> Option<&'static Register> {
    ALL.iter()
        .find(|reg| reg.read_addr == addr || reg.write_addr == Some(addr))
}

/// Readback address for a write address, if mapped.
pub fn readback_for(write_addr: u8) -> Option<u8> {
    ALL.iter()
        .find(|reg| reg.write_addr == Some(write_addr))
        .map(|reg| reg.read_addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_addresses_differ() {
        for reg in ALL.iter().filter(|r| r.write_addr.is_some()) {
            assert_ne!(reg.write_addr, Some(reg.read_addr), "{}", reg.name);
        }
    }

    #[test]
    fn widths_match_register_map() {
        assert_eq!(MODE.width, 1);
        assert_eq!(EXTERNAL_PRINT_CONFIG.width, 2);
        assert_eq!(DARK_EXPOSED_FRAMES.width, 5);
        assert_eq!(CRC_RESULT.width, 2);
    }

    #[test]
    fn lookup_by_either_address() {
        assert_eq!(by_address(0xCA).map(|r| r.name), Some("fpga_control"));
        assert_eq!(by_address(0xCB).map(|r| r.name), Some("fpga_control"));
        assert_eq!(readback_for(0xC1), Some(0xC2));
        assert_eq!(readback_for(0xCE), None);
        assert!(by_address(0x42).is_none());
    }

    #[test]
    fn quirky_registers_are_flagged() {
        let stale: Vec<_> = ALL
            .iter()
            .filter(|r| r.stale_readback)
            .map(|r| r.name)
            .collect();
        assert_eq!(stale, vec!["video_interface", "active_buffer", "fpga_control"]);
    }
}
