//! V.8 call-menu negotiation (C13), simplified: a CM/JM/CI exchange used to
//! agree on a modulation class before Phase A proper starts, recovered from
//! the original source's "V.8 menu concept" and modelled as a plain
//! capability-intersection rather than the full bit-level CM/JM signal set.

use crate::config::ModemMask;

/// One entry of the V.8 call menu: a modulation class a side is willing to
/// use, ordered fastest-first for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFunction {
    /// Plain old fax modulations (V.27ter/V.29/V.17), no V.8 needed.
    Fax,
    /// V.34 half-duplex, highest fax modulation.
    V34Hdx,
}

/// The call menu (CM) or joint menu (JM) signal: a small ordered list of
/// supported call functions.
#[derive(Debug, Clone, Default)]
pub struct CallMenu {
    pub functions: Vec<CallFunction>,
}

impl CallMenu {
    pub fn from_modem_mask(mask: ModemMask) -> Self {
        let mut functions = vec![CallFunction::Fax];
        if mask.contains(ModemMask::V34HDX) {
            functions.push(CallFunction::V34Hdx);
        }
        Self { functions }
    }

    pub fn supports(&self, function: CallFunction) -> bool {
        self.functions.contains(&function)
    }
}

/// Negotiate the joint menu: the fastest function both the calling (CM)
/// and answering (CI/JM) sides support, falling back to plain fax
/// modulation if no richer function is shared.
pub fn negotiate(cm: &CallMenu, answer: &CallMenu) -> CallFunction {
    if cm.supports(CallFunction::V34Hdx) && answer.supports(CallFunction::V34Hdx) {
        CallFunction::V34Hdx
    } else {
        CallFunction::Fax
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_picks_v34_when_both_sides_support_it() {
        let cm = CallMenu::from_modem_mask(ModemMask::V34HDX.union(ModemMask::V29));
        let jm = CallMenu::from_modem_mask(ModemMask::V34HDX);
        assert_eq!(negotiate(&cm, &jm), CallFunction::V34Hdx);
    }

    #[test]
    fn negotiation_falls_back_to_fax_without_shared_v34() {
        let cm = CallMenu::from_modem_mask(ModemMask::V29);
        let jm = CallMenu::from_modem_mask(ModemMask::V34HDX);
        assert_eq!(negotiate(&cm, &jm), CallFunction::Fax);
    }
}
