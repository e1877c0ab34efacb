use super::{State, SupportError};
use crate::{
    abiencode::{
        self,
        types::{Address, Hash, Signature},
    },
    sig::{self, Signer},
};

/// A state together with one participant's signature on its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedState {
    pub state: State,
    pub signer: Address,
    pub signature: Signature,
}

impl SignedState {
    pub fn sign(state: State, signer: &Signer) -> Result<Self, abiencode::Error> {
        let signature = signer.sign_eth(state.hash()?);
        Ok(Self {
            state,
            signer: signer.address(),
            signature,
        })
    }

    /// Check that the signature recovers to [SignedState::signer] and return
    /// the state digest.
    pub fn verify(&self) -> Result<Hash, SupportError> {
        let hash = self.state.hash()?;
        let recovered = sig::recover_signer(hash, self.signature)?;
        if recovered != self.signer {
            return Err(SupportError::SignerMismatch {
                expected: self.signer,
                recovered,
            });
        }
        Ok(hash)
    }
}
