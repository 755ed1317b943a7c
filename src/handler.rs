//! User handler capability set.
//!
//! The dispatcher selects the narrow method by the type identification
//! of the received unit; everything without a dedicated capability goes
//! through [`ClientHandler::unhandled`]. Handler errors are logged by
//! the session and never abort it.

use crate::codec::DecodedApdu;
use crate::error::Result;
use crate::types::TypeId;

/// Callbacks invoked by the session dispatcher.
///
/// Every method receives the whole decoded APDU and defaults to
/// [`unhandled`](Self::unhandled), so an implementation only overrides
/// what it cares about.
pub trait ClientHandler: Send + Sync {
    /// General interrogation responses and confirmations (C_IC_NA_1).
    fn general_interrogation(&self, apdu: &DecodedApdu) -> Result<()> {
        self.unhandled(apdu)
    }

    /// Counter interrogation responses and confirmations (C_CI_NA_1).
    fn counter_interrogation(&self, apdu: &DecodedApdu) -> Result<()> {
        self.unhandled(apdu)
    }

    /// Read command mirror (C_RD_NA_1).
    fn read(&self, apdu: &DecodedApdu) -> Result<()> {
        self.unhandled(apdu)
    }

    /// Clock synchronization mirror (C_CS_NA_1).
    fn clock_synchronization(&self, apdu: &DecodedApdu) -> Result<()> {
        self.unhandled(apdu)
    }

    /// Test command mirror (C_TS_NB_1, C_TS_TA_1).
    fn test_command(&self, apdu: &DecodedApdu) -> Result<()> {
        self.unhandled(apdu)
    }

    /// Reset process command mirror (C_RP_NA_1).
    fn reset_process(&self, apdu: &DecodedApdu) -> Result<()> {
        self.unhandled(apdu)
    }

    /// Delay acquisition mirror (C_CD_NA_1).
    fn delay_acquisition(&self, apdu: &DecodedApdu) -> Result<()> {
        self.unhandled(apdu)
    }

    /// Everything else, notably all monitor-direction data.
    fn unhandled(&self, apdu: &DecodedApdu) -> Result<()> {
        let _ = apdu;
        Ok(())
    }
}

/// Handler that accepts and discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl ClientHandler for NullHandler {}

/// Route one decoded unit to the matching capability.
pub(crate) fn dispatch(handler: &dyn ClientHandler, apdu: &DecodedApdu) -> Result<()> {
    match apdu.asdu.header.type_id {
        TypeId::InterrogationCommand => handler.general_interrogation(apdu),
        TypeId::CounterInterrogation => handler.counter_interrogation(apdu),
        TypeId::ReadCommand => handler.read(apdu),
        TypeId::ClockSync => handler.clock_synchronization(apdu),
        TypeId::TestCommand | TypeId::TestCommandTime56 => handler.test_command(apdu),
        TypeId::ResetProcess => handler.reset_process(apdu),
        TypeId::DelayAcquisition => handler.delay_acquisition(apdu),
        _ => handler.unhandled(apdu),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parser::decode_asdu;
    use crate::types::{Apci, Asdu, AsduHeader, Cot, Vsq};
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Recorder {
        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }

        fn taken(&self) -> Vec<&'static str> {
            std::mem::take(&mut self.calls.lock().unwrap())
        }
    }

    impl ClientHandler for Recorder {
        fn general_interrogation(&self, _: &DecodedApdu) -> Result<()> {
            self.record("gi");
            Ok(())
        }

        fn counter_interrogation(&self, _: &DecodedApdu) -> Result<()> {
            self.record("ci");
            Ok(())
        }

        fn clock_synchronization(&self, _: &DecodedApdu) -> Result<()> {
            self.record("clock");
            Ok(())
        }

        fn test_command(&self, _: &DecodedApdu) -> Result<()> {
            self.record("test");
            Ok(())
        }

        fn unhandled(&self, _: &DecodedApdu) -> Result<()> {
            self.record("default");
            Err(Error::config_static("handler fault"))
        }
    }

    fn decoded(type_id: TypeId, cot: Cot, body: &[u8], count: u8) -> DecodedApdu {
        let mut header = AsduHeader::new(type_id, count, cot, 1);
        header.vsq = Vsq::new(count, false);
        let asdu = Asdu {
            header,
            body: Bytes::copy_from_slice(body),
        };
        DecodedApdu {
            apci: Apci::i_frame(0, 0),
            asdu: decode_asdu(&asdu).unwrap(),
        }
    }

    #[test]
    fn test_dispatch_by_type_id() {
        let recorder = Recorder::default();

        let gi = decoded(
            TypeId::InterrogationCommand,
            Cot::ActivationConfirm,
            &[0x00, 0x00, 0x00, 0x14],
            1,
        );
        dispatch(&recorder, &gi).unwrap();

        let ci = decoded(
            TypeId::CounterInterrogation,
            Cot::ActivationConfirm,
            &[0x00, 0x00, 0x00, 0x45],
            1,
        );
        dispatch(&recorder, &ci).unwrap();

        let time = crate::types::Cp56Time2a::default().to_bytes();
        let mut body = vec![0x00, 0x00, 0x00];
        body.extend_from_slice(&time);
        let clock = decoded(TypeId::ClockSync, Cot::ActivationConfirm, &body, 1);
        dispatch(&recorder, &clock).unwrap();

        let test = decoded(
            TypeId::TestCommand,
            Cot::ActivationConfirm,
            &[0x00, 0x00, 0x00, 0x55, 0xAA],
            1,
        );
        dispatch(&recorder, &test).unwrap();

        assert_eq!(recorder.taken(), ["gi", "ci", "clock", "test"]);
    }

    #[test]
    fn test_monitor_data_goes_to_default() {
        let recorder = Recorder::default();
        let unit = decoded(
            TypeId::SinglePoint,
            Cot::Spontaneous,
            &[0xE9, 0x03, 0x00, 0x01],
            1,
        );
        // The recorder's default capability reports an error; dispatch
        // surfaces it to the caller (the session merely logs it).
        assert!(dispatch(&recorder, &unit).is_err());
        assert_eq!(recorder.taken(), ["default"]);
    }

    #[test]
    fn test_null_handler_accepts_everything() {
        let unit = decoded(
            TypeId::SinglePoint,
            Cot::Spontaneous,
            &[0xE9, 0x03, 0x00, 0x01],
            1,
        );
        assert!(dispatch(&NullHandler, &unit).is_ok());
    }
}
