//! Set/Get SOL Configuration Parameters.
//!
//! SOL settings are properties of the per-interface console object owned
//! by the SOL service; the bit rate is read back from the host console
//! service. Reference: IPMI 2.0 Specification, Section 26, Table 26-5.

use crate::bus::{names, Bus, Value};
use crate::channel::{convert_current, Channels, SessionSupport};
use crate::codec::Payload;
use crate::completion::CompletionCode;
use crate::{success, unpack, CommandResult, TransportHandler};

/// Set SOL Configuration Parameters command number.
pub const CMD_SET_SOL_CONFIG_PARAMETERS: u8 = 0x21;
/// Get SOL Configuration Parameters command number.
pub const CMD_GET_SOL_CONFIG_PARAMETERS: u8 = 0x22;

/// Revision of the parameter format implemented here.
const SOL_PARAM_REVISION: u8 = 0x11;

/// RMCP+ port carried by the payload-port parameter.
const IPMI_STD_PORT: u16 = 623;

const PROGRESS_MASK: u8 = 0x03;
const ENABLE_MASK: u8 = 0x01;
const RETRY_MASK: u8 = 0x07;
const PRIVILEGE_MASK: u8 = 0x0F;

/// SOL configuration parameter selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolParam {
    SetInProgress,
    Enable,
    Authentication,
    Accumulate,
    Retry,
    NonVolatileBitRate,
    VolatileBitRate,
    PayloadChannel,
    PayloadPort,
}

impl TryFrom<u8> for SolParam {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(Self::SetInProgress),
            1 => Ok(Self::Enable),
            2 => Ok(Self::Authentication),
            3 => Ok(Self::Accumulate),
            4 => Ok(Self::Retry),
            5 => Ok(Self::NonVolatileBitRate),
            6 => Ok(Self::VolatileBitRate),
            7 => Ok(Self::PayloadChannel),
            8 => Ok(Self::PayloadPort),
            _ => Err(()),
        }
    }
}

/// SOL payload privilege levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Privilege {
    User = 2,
    Oem = 5,
}

/// Map a console baud rate to its SOL bit-rate encoding. Rates outside
/// the fixed set report 0.
fn bit_rate_code(baud: u64) -> u8 {
    match baud {
        9600 => 0x06,
        19200 => 0x07,
        38400 => 0x08,
        57600 => 0x09,
        115200 => 0x0A,
        _ => 0,
    }
}

impl<B: Bus, C: Channels> TransportHandler<B, C> {
    fn sol_object(&self, channel: u8) -> Result<(String, String), CompletionCode> {
        let ifname = self
            .channels
            .name(channel)
            .ok_or(CompletionCode::InvalidFieldInRequest)?;
        let path = format!("{}{ifname}", names::PATH_SOL);
        let service = self.bus.get_object(&path, names::INTF_SOL).map_err(|err| {
            log::error!("Unable to find the SOL service: {err}");
            CompletionCode::UnspecifiedError
        })?;
        Ok((service, path))
    }

    fn sol_get(&self, channel: u8, property: &str) -> Result<Value, CompletionCode> {
        let (service, path) = self.sol_object(channel)?;
        self.bus
            .get_property(&service, &path, names::INTF_SOL, property)
            .map_err(|err| {
                log::error!("Error getting SOL parameter {property}: {err}");
                CompletionCode::UnspecifiedError
            })
    }

    fn sol_get_u8(&self, channel: u8, property: &str) -> Result<u8, CompletionCode> {
        self.sol_get(channel, property)?
            .as_u64()
            .map(|v| v as u8)
            .ok_or(CompletionCode::UnspecifiedError)
    }

    fn sol_get_bool(&self, channel: u8, property: &str) -> Result<bool, CompletionCode> {
        self.sol_get(channel, property)?
            .as_bool()
            .ok_or(CompletionCode::UnspecifiedError)
    }

    fn sol_set(&self, channel: u8, property: &str, value: Value) -> Result<(), CompletionCode> {
        let (service, path) = self.sol_object(channel)?;
        self.bus
            .set_property(&service, &path, names::INTF_SOL, property, value)
            .map_err(|err| {
                log::error!("Error setting SOL parameter {property}: {err}");
                CompletionCode::UnspecifiedError
            })
    }

    /// Handle a Set SOL Configuration Parameters request.
    pub fn set_sol(&mut self, ctx_channel: u8, req: &mut Payload) -> CommandResult {
        let channel_bits = unpack(req.unpack_bits(4))? as u8;
        let reserved = unpack(req.unpack_bits(4))?;
        let parameter = unpack(req.unpack_u8())?;
        let data1 = unpack(req.unpack_u8())?;
        let data2 = if req.remaining_bytes() > 0 {
            Some(unpack(req.unpack_u8())?)
        } else {
            None
        };
        if !req.fully_unpacked() {
            return Err(CompletionCode::ReqDataLenInvalid);
        }

        let channel = convert_current(channel_bits, ctx_channel);
        if reserved != 0 || !self.channels.is_valid(channel) || !self.channels.is_lan(channel) {
            return Err(CompletionCode::InvalidFieldInRequest);
        }

        let param = SolParam::try_from(parameter)
            .map_err(|()| CompletionCode::ParamNotSupported)?;
        match param {
            SolParam::SetInProgress => {
                if data2.is_some() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let progress = data1 & PROGRESS_MASK;
                let current = self.sol_get_u8(channel, "Progress")?;
                if current == 1 && progress == 1 {
                    return Err(CompletionCode::ParamSetLocked);
                }
                self.sol_set(channel, "Progress", Value::U8(progress))?;
                success()
            }
            SolParam::Enable => {
                if data2.is_some() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let enable = data1 & ENABLE_MASK != 0;
                self.sol_set(channel, "Enable", Value::Bool(enable))?;
                success()
            }
            SolParam::Authentication => {
                if data2.is_some() {
                    return Err(CompletionCode::ReqDataLenInvalid);
                }
                let privilege = data1 & PRIVILEGE_MASK;
                if privilege < Privilege::User as u8 || privilege > Privilege::Oem as u8 {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                self.sol_set(channel, "Privilege", Value::U8(privilege))?;
                success()
            }
            SolParam::Accumulate => {
                let threshold = data2.ok_or(CompletionCode::ReqDataLenInvalid)?;
                if threshold == 0 {
                    return Err(CompletionCode::InvalidFieldInRequest);
                }
                self.sol_set(channel, "AccumulateIntervalMS", Value::U8(data1))?;
                self.sol_set(channel, "Threshold", Value::U8(threshold))?;
                success()
            }
            SolParam::Retry => {
                let interval = data2.ok_or(CompletionCode::ReqDataLenInvalid)?;
                self.sol_set(channel, "RetryCount", Value::U8(data1 & RETRY_MASK))?;
                self.sol_set(channel, "RetryIntervalMS", Value::U8(interval))?;
                success()
            }
            SolParam::PayloadPort => Err(CompletionCode::ParamReadOnly),
            SolParam::NonVolatileBitRate
            | SolParam::VolatileBitRate
            | SolParam::PayloadChannel => Err(CompletionCode::ParamNotSupported),
        }
    }

    /// Handle a Get SOL Configuration Parameters request.
    ///
    /// Successful responses lead with the parameter revision byte.
    pub fn get_sol(&mut self, ctx_channel: u8, req: &mut Payload) -> CommandResult {
        let channel_bits = unpack(req.unpack_bits(4))? as u8;
        let reserved = unpack(req.unpack_bits(3))?;
        let rev_only = unpack(req.unpack_bool())?;
        let parameter = unpack(req.unpack_u8())?;
        let _set = unpack(req.unpack_u8())?;
        let _block = unpack(req.unpack_u8())?;
        if !req.fully_unpacked() {
            return Err(CompletionCode::ReqDataLenInvalid);
        }

        let channel = convert_current(channel_bits, ctx_channel);
        if reserved != 0
            || !self.channels.is_valid(channel)
            || !self.channels.is_lan(channel)
            || self.channels.session_support(channel) == SessionSupport::None
        {
            return Err(CompletionCode::InvalidFieldInRequest);
        }

        let mut ret = Payload::new();
        ret.pack_u8(SOL_PARAM_REVISION);
        if rev_only {
            return Ok(ret);
        }

        let param = SolParam::try_from(parameter)
            .map_err(|()| CompletionCode::ParamNotSupported)?;
        match param {
            SolParam::SetInProgress => {
                ret.pack_u8(self.sol_get_u8(channel, "Progress")?);
                Ok(ret)
            }
            SolParam::Enable => {
                ret.pack_u8(self.sol_get_bool(channel, "Enable")? as u8);
                Ok(ret)
            }
            SolParam::Authentication => {
                let mut authentication = self.sol_get_u8(channel, "Privilege")? & PRIVILEGE_MASK;
                authentication |=
                    (self.sol_get_bool(channel, "ForceAuthentication")? as u8) << 6;
                authentication |= (self.sol_get_bool(channel, "ForceEncryption")? as u8) << 7;
                ret.pack_u8(authentication);
                Ok(ret)
            }
            SolParam::Accumulate => {
                ret.pack_u8(self.sol_get_u8(channel, "AccumulateIntervalMS")?);
                ret.pack_u8(self.sol_get_u8(channel, "Threshold")?);
                Ok(ret)
            }
            SolParam::Retry => {
                ret.pack_u8(self.sol_get_u8(channel, "RetryCount")? & RETRY_MASK);
                ret.pack_u8(self.sol_get_u8(channel, "RetryIntervalMS")?);
                Ok(ret)
            }
            SolParam::NonVolatileBitRate | SolParam::VolatileBitRate => {
                let baud = self
                    .bus
                    .get_property(
                        names::CONSOLE_SERVICE,
                        names::CONSOLE_PATH,
                        names::INTF_CONSOLE,
                        "baudrate",
                    )
                    .map_err(|err| {
                        log::error!("Error getting SOL baud rate: {err}");
                        CompletionCode::UnspecifiedError
                    })?
                    .as_u64()
                    .ok_or(CompletionCode::UnspecifiedError)?;
                ret.pack_u8(bit_rate_code(baud));
                Ok(ret)
            }
            SolParam::PayloadChannel => {
                ret.pack_u8(channel);
                Ok(ret)
            }
            SolParam::PayloadPort => {
                ret.pack_u16(IPMI_STD_PORT);
                Ok(ret)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{channel_table, FakeBus};

    fn sol_path() -> String {
        format!("{}eth0", names::PATH_SOL)
    }

    fn seed_sol(bus: &FakeBus) {
        let path = sol_path();
        bus.set_prop(&path, "Progress", Value::U8(0));
        bus.set_prop(&path, "Enable", Value::Bool(false));
        bus.set_prop(&path, "Privilege", Value::U8(2));
        bus.set_prop(&path, "ForceAuthentication", Value::Bool(true));
        bus.set_prop(&path, "ForceEncryption", Value::Bool(true));
        bus.set_prop(&path, "AccumulateIntervalMS", Value::U8(20));
        bus.set_prop(&path, "Threshold", Value::U8(1));
        bus.set_prop(&path, "RetryCount", Value::U8(7));
        bus.set_prop(&path, "RetryIntervalMS", Value::U8(10));
        bus.set_prop(names::CONSOLE_PATH, "baudrate", Value::U32(115200));
    }

    fn handler() -> TransportHandler<FakeBus, crate::channel::ChannelTable> {
        let bus = FakeBus::new();
        seed_sol(&bus);
        TransportHandler::new(bus, channel_table())
    }

    fn set(
        handler: &mut TransportHandler<FakeBus, crate::channel::ChannelTable>,
        data: &[u8],
    ) -> CommandResult {
        handler.set_sol(1, &mut Payload::from_bytes(data.to_vec()))
    }

    fn get(
        handler: &mut TransportHandler<FakeBus, crate::channel::ChannelTable>,
        data: &[u8],
    ) -> CommandResult {
        handler.get_sol(1, &mut Payload::from_bytes(data.to_vec()))
    }

    #[test]
    fn progress_lock() {
        let mut handler = handler();
        assert!(set(&mut handler, &[0x01, 0, 0x01]).is_ok());
        assert_eq!(
            set(&mut handler, &[0x01, 0, 0x01]),
            Err(CompletionCode::ParamSetLocked)
        );
        assert!(set(&mut handler, &[0x01, 0, 0x00]).is_ok());
        assert_eq!(
            handler.bus().prop(&sol_path(), "Progress"),
            Some(Value::U8(0))
        );
    }

    #[test]
    fn enable_and_readback() {
        let mut handler = handler();
        assert!(set(&mut handler, &[0x01, 1, 0x01]).is_ok());
        let ret = get(&mut handler, &[0x01, 1, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 1]);
    }

    #[test]
    fn authentication_bounds_and_bits() {
        let mut handler = handler();
        // privilege below User is rejected
        assert_eq!(
            set(&mut handler, &[0x01, 2, 0x01]),
            Err(CompletionCode::InvalidFieldInRequest)
        );
        assert!(set(&mut handler, &[0x01, 2, 0x04]).is_ok());
        // readback folds in the forced-auth and forced-encrypt bits
        let ret = get(&mut handler, &[0x01, 2, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 0x04 | 0x40 | 0x80]);
    }

    #[test]
    fn accumulate_requires_nonzero_threshold() {
        let mut handler = handler();
        assert_eq!(
            set(&mut handler, &[0x01, 3, 20]),
            Err(CompletionCode::ReqDataLenInvalid)
        );
        assert_eq!(
            set(&mut handler, &[0x01, 3, 20, 0]),
            Err(CompletionCode::InvalidFieldInRequest)
        );
        assert!(set(&mut handler, &[0x01, 3, 20, 5]).is_ok());
        let ret = get(&mut handler, &[0x01, 3, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 20, 5]);
    }

    #[test]
    fn retry_masks_count() {
        let mut handler = handler();
        assert!(set(&mut handler, &[0x01, 4, 0xFF, 30]).is_ok());
        let ret = get(&mut handler, &[0x01, 4, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 0x07, 30]);
    }

    #[test]
    fn bit_rate_mapping() {
        let mut handler = handler();
        let ret = get(&mut handler, &[0x01, 5, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 0x0A]);
        handler
            .bus()
            .set_prop(names::CONSOLE_PATH, "baudrate", Value::U32(57600));
        let ret = get(&mut handler, &[0x01, 6, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 0x09]);
        // outside the fixed encoding set
        handler
            .bus()
            .set_prop(names::CONSOLE_PATH, "baudrate", Value::U32(1200));
        let ret = get(&mut handler, &[0x01, 5, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 0]);
    }

    #[test]
    fn payload_channel_and_port() {
        let mut handler = handler();
        let ret = get(&mut handler, &[0x01, 7, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 1]);
        let ret = get(&mut handler, &[0x01, 8, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION, 0x6F, 0x02]);
        assert_eq!(
            set(&mut handler, &[0x01, 8, 0]),
            Err(CompletionCode::ParamReadOnly)
        );
    }

    #[test]
    fn revision_only_and_unknown_param() {
        let mut handler = handler();
        let ret = get(&mut handler, &[0x81, 0, 0, 0]).unwrap();
        assert_eq!(ret.bytes(), &[SOL_PARAM_REVISION]);
        assert_eq!(
            get(&mut handler, &[0x01, 9, 0, 0]),
            Err(CompletionCode::ParamNotSupported)
        );
        assert_eq!(
            set(&mut handler, &[0x01, 9, 0]),
            Err(CompletionCode::ParamNotSupported)
        );
    }

    #[test]
    fn invalid_channel_rejected() {
        let mut handler = handler();
        assert_eq!(
            set(&mut handler, &[0x05, 0, 0x01]),
            Err(CompletionCode::InvalidFieldInRequest)
        );
    }
}
