/// Return value of a `cgroup/connect4` or `cgroup/connect6` program.
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "user",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SockVerdict {
    /// The connect attempt fails with `EPERM`.
    Reject = 0,
    /// The connect attempt proceeds.
    Allow = 1,
}

impl From<SockVerdict> for i32 {
    fn from(verdict: SockVerdict) -> i32 {
        verdict as i32
    }
}

impl TryFrom<i32> for SockVerdict {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Reject),
            1 => Ok(Self::Allow),
            v => Err(v),
        }
    }
}

/// Return value of an XDP program, numerically equal to `xdp_action`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "user",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum XdpVerdict {
    Aborted = 0,
    Drop = 1,
    Pass = 2,
    Tx = 3,
    Redirect = 4,
}

impl From<XdpVerdict> for u32 {
    fn from(verdict: XdpVerdict) -> u32 {
        verdict as u32
    }
}

impl TryFrom<u32> for XdpVerdict {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Aborted,
            1 => Self::Drop,
            2 => Self::Pass,
            3 => Self::Tx,
            4 => Self::Redirect,
            v => return Err(v),
        })
    }
}

/// Verdicts an entry program returns when its tail call falls through.
///
/// Stored in the `FALLBACK` global of the eBPF object. Whether a missing
/// handler fails open or closed is a policy of the deployment, so the loader
/// always writes this explicitly; the zeroed value compiled into the object
/// (reject and abort) only applies to an object loaded without it.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fallback {
    /// Raw [`SockVerdict`] for the connect hooks.
    pub connect: i32,
    /// Raw [`XdpVerdict`] for the edge hook.
    pub xdp: u32,
}

impl Fallback {
    pub const fn new(connect: SockVerdict, xdp: XdpVerdict) -> Self {
        Self {
            connect: connect as i32,
            xdp: xdp as u32,
        }
    }

    /// The zeroed value the eBPF object is compiled with.
    pub const fn fail_closed() -> Self {
        Self::new(SockVerdict::Reject, XdpVerdict::Aborted)
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for Fallback {}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn sock_verdict_codes() {
        assert_eq!(i32::from(SockVerdict::Allow), 1);
        assert_matches!(SockVerdict::try_from(0), Ok(SockVerdict::Reject));
        assert_matches!(SockVerdict::try_from(-1), Err(-1));
    }

    #[test]
    fn xdp_verdict_codes() {
        assert_eq!(u32::from(XdpVerdict::Pass), 2);
        assert_matches!(XdpVerdict::try_from(1), Ok(XdpVerdict::Drop));
        assert_matches!(XdpVerdict::try_from(9), Err(9));
    }

    #[test]
    fn fail_closed_is_zeroed() {
        assert_matches!(Fallback::fail_closed(), Fallback { connect: 0, xdp: 0 });
    }
}
