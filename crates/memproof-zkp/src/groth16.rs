//! # Groth16 over BN254 (snarkjs wire format)
//!
//! Proofs and verification keys travel in the JSON layout snarkjs emits.
//! Every coordinate is a decimal string and points are projective with
//! `z = 1` (or `z = 0` for the point at infinity):
//!
//! ```text
//! pi_a: [x, y, z]                      G1
//! pi_b: [[x.c0, x.c1], [y.c0, y.c1], [z.c0, z.c1]]   G2
//! pi_c: [x, y, z]                      G1
//! protocol: "groth16", curve: "bn128"
//! ```
//!
//! [`verify_snarkjs`] converts both sides to arkworks types, rejecting
//! off-curve or wrong-subgroup points, and runs the pairing check natively.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{Groth16, Proof, VerifyingKey};
use ark_snark::SNARK;
use memproof_core::FieldElement;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::traits::VerifyError;

/// Value of the `protocol` tag.
pub const PROTOCOL: &str = "groth16";
/// Value of the `curve` tag. snarkjs calls BN254 `bn128`.
pub const CURVE: &str = "bn128";

/// A Groth16 proof in snarkjs layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    /// G1 point `A`.
    pub pi_a: Vec<String>,
    /// G2 point `B`.
    pub pi_b: Vec<Vec<String>>,
    /// G1 point `C`.
    pub pi_c: Vec<String>,
    /// Always `"groth16"`.
    pub protocol: String,
    /// Always `"bn128"`.
    pub curve: String,
}

impl Groth16Proof {
    /// Shape check only: tags, coordinate counts, decimal digits.
    /// Says nothing about whether the points are on the curve.
    pub fn is_well_formed(&self) -> bool {
        self.protocol == PROTOCOL
            && self.curve == CURVE
            && self.pi_a.len() == 3
            && self.pi_c.len() == 3
            && self.pi_b.len() == 3
            && self.pi_b.iter().all(|pair| pair.len() == 2)
            && self
                .pi_a
                .iter()
                .chain(&self.pi_c)
                .chain(self.pi_b.iter().flatten())
                .all(|c| is_decimal(c))
    }

    /// Render an arkworks proof.
    pub fn from_ark(proof: &Proof<Bn254>) -> Self {
        Self {
            pi_a: g1_to_strings(&proof.a),
            pi_b: g2_to_strings(&proof.b),
            pi_c: g1_to_strings(&proof.c),
            protocol: PROTOCOL.to_string(),
            curve: CURVE.to_string(),
        }
    }

    /// Parse into an arkworks proof, checking every point.
    pub fn to_ark(&self) -> Result<Proof<Bn254>, VerifyError> {
        if self.protocol != PROTOCOL || self.curve != CURVE {
            return Err(VerifyError::MalformedProof(format!(
                "unsupported protocol/curve {}/{}",
                self.protocol, self.curve
            )));
        }
        Ok(Proof {
            a: parse_g1(&self.pi_a).map_err(VerifyError::MalformedProof)?,
            b: parse_g2(&self.pi_b).map_err(VerifyError::MalformedProof)?,
            c: parse_g1(&self.pi_c).map_err(VerifyError::MalformedProof)?,
        })
    }
}

/// A verification key in snarkjs layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsVerifyingKey {
    /// Always `"groth16"`.
    pub protocol: String,
    /// Always `"bn128"`.
    pub curve: String,
    /// Number of public signals.
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    /// `alpha` in G1.
    pub vk_alpha_1: Vec<String>,
    /// `beta` in G2.
    pub vk_beta_2: Vec<Vec<String>>,
    /// `gamma` in G2.
    pub vk_gamma_2: Vec<Vec<String>>,
    /// `delta` in G2.
    pub vk_delta_2: Vec<Vec<String>>,
    /// One G1 point per public signal, plus the constant term.
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

impl SnarkjsVerifyingKey {
    /// Render an arkworks key.
    pub fn from_ark(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            protocol: PROTOCOL.to_string(),
            curve: CURVE.to_string(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_to_strings(&vk.alpha_g1),
            vk_beta_2: g2_to_strings(&vk.beta_g2),
            vk_gamma_2: g2_to_strings(&vk.gamma_g2),
            vk_delta_2: g2_to_strings(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_to_strings).collect(),
        }
    }

    /// Parse into an arkworks key, checking every point.
    pub fn to_ark(&self) -> Result<VerifyingKey<Bn254>, VerifyError> {
        if self.protocol != PROTOCOL || self.curve != CURVE {
            return Err(VerifyError::MalformedKey(format!(
                "unsupported protocol/curve {}/{}",
                self.protocol, self.curve
            )));
        }
        if self.ic.len() != self.n_public + 1 {
            return Err(VerifyError::MalformedKey(format!(
                "nPublic is {} but IC has {} points",
                self.n_public,
                self.ic.len()
            )));
        }
        let gamma_abc_g1 = self
            .ic
            .iter()
            .map(|p| parse_g1(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(VerifyError::MalformedKey)?;
        Ok(VerifyingKey {
            alpha_g1: parse_g1(&self.vk_alpha_1).map_err(VerifyError::MalformedKey)?,
            beta_g2: parse_g2(&self.vk_beta_2).map_err(VerifyError::MalformedKey)?,
            gamma_g2: parse_g2(&self.vk_gamma_2).map_err(VerifyError::MalformedKey)?,
            delta_g2: parse_g2(&self.vk_delta_2).map_err(VerifyError::MalformedKey)?,
            gamma_abc_g1,
        })
    }
}

/// Pairing-check `proof` against a snarkjs verification key.
pub fn verify_snarkjs(
    verification_key: &serde_json::Value,
    public_signals: &[String],
    proof: &Groth16Proof,
) -> Result<bool, VerifyError> {
    let vk: SnarkjsVerifyingKey = serde_json::from_value(verification_key.clone())
        .map_err(|e| VerifyError::MalformedKey(e.to_string()))?;
    if public_signals.len() != vk.n_public {
        return Err(VerifyError::MalformedSignals(format!(
            "key expects {} public signals, got {}",
            vk.n_public,
            public_signals.len()
        )));
    }
    let inputs = public_signals
        .iter()
        .map(|s| FieldElement::parse(s).map(Fr::from))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| VerifyError::MalformedSignals(e.to_string()))?;

    let vk = vk.to_ark()?;
    let proof = proof.to_ark()?;

    let pvk = Groth16::<Bn254>::process_vk(&vk)
        .map_err(|e| VerifyError::MalformedKey(e.to_string()))?;
    Groth16::<Bn254>::verify_with_processed_vk(&pvk, &inputs, &proof)
        .map_err(|e| VerifyError::VerificationFailed(e.to_string()))
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn fq_modulus() -> BigUint {
    BigUint::from_bytes_be(&Fq::MODULUS.to_bytes_be())
}

fn parse_fq(s: &str) -> Result<Fq, String> {
    if !is_decimal(s) {
        return Err(format!("coordinate {s:?} is not a decimal integer"));
    }
    let value = BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| format!("coordinate {s:?} is not a decimal integer"))?;
    if value >= fq_modulus() {
        return Err(format!("coordinate {s} exceeds the base field"));
    }
    Ok(Fq::from_be_bytes_mod_order(&value.to_bytes_be()))
}

fn fq_to_string(value: &Fq) -> String {
    BigUint::from_bytes_be(&value.into_bigint().to_bytes_be()).to_string()
}

fn parse_g1(coords: &[String]) -> Result<G1Affine, String> {
    let [x, y, z] = coords else {
        return Err(format!("G1 point needs 3 coordinates, got {}", coords.len()));
    };
    match z.as_str() {
        "0" => Ok(<G1Affine as AffineRepr>::zero()),
        "1" => {
            let point = G1Affine::new_unchecked(parse_fq(x)?, parse_fq(y)?);
            if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
                return Err("G1 point is not in the prime-order subgroup".to_string());
            }
            Ok(point)
        }
        other => Err(format!("G1 point is not normalized (z = {other})")),
    }
}

fn parse_fq2(pair: &[String]) -> Result<Fq2, String> {
    let [c0, c1] = pair else {
        return Err(format!("Fq2 element needs 2 limbs, got {}", pair.len()));
    };
    Ok(Fq2::new(parse_fq(c0)?, parse_fq(c1)?))
}

fn parse_g2(coords: &[Vec<String>]) -> Result<G2Affine, String> {
    let [x, y, z] = coords else {
        return Err(format!("G2 point needs 3 coordinates, got {}", coords.len()));
    };
    let z: Vec<&str> = z.iter().map(String::as_str).collect();
    match z.as_slice() {
        ["0", "0"] => Ok(<G2Affine as AffineRepr>::zero()),
        ["1", "0"] => {
            let point = G2Affine::new_unchecked(parse_fq2(x)?, parse_fq2(y)?);
            if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
                return Err("G2 point is not in the prime-order subgroup".to_string());
            }
            Ok(point)
        }
        other => Err(format!("G2 point is not normalized (z = {other:?})")),
    }
}

fn g1_to_strings(point: &G1Affine) -> Vec<String> {
    if point.infinity {
        return vec!["0".into(), "1".into(), "0".into()];
    }
    vec![fq_to_string(&point.x), fq_to_string(&point.y), "1".into()]
}

fn g2_to_strings(point: &G2Affine) -> Vec<Vec<String>> {
    if point.infinity {
        return vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ];
    }
    vec![
        vec![fq_to_string(&point.x.c0), fq_to_string(&point.x.c1)],
        vec![fq_to_string(&point.y.c0), fq_to_string(&point.y.c1)],
        vec!["1".into(), "0".into()],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::lc;
    use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
    use ark_snark::CircuitSpecificSetupSNARK;

    /// `x * y == z`, `z` public.
    #[derive(Clone)]
    struct Product {
        x: Option<Fr>,
        y: Option<Fr>,
    }

    impl ConstraintSynthesizer<Fr> for Product {
        fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
            let z_val = self.x.zip(self.y).map(|(x, y)| x * y);
            let x = cs.new_witness_variable(|| self.x.ok_or(SynthesisError::AssignmentMissing))?;
            let y = cs.new_witness_variable(|| self.y.ok_or(SynthesisError::AssignmentMissing))?;
            let z = cs.new_input_variable(|| z_val.ok_or(SynthesisError::AssignmentMissing))?;
            cs.enforce_constraint(lc!() + x, lc!() + y, lc!() + z)?;
            Ok(())
        }
    }

    fn fixture() -> (serde_json::Value, Groth16Proof) {
        let mut rng = <ark_std::rand::rngs::StdRng as ark_std::rand::SeedableRng>::seed_from_u64(0);
        let (pk, vk) =
            Groth16::<Bn254>::circuit_specific_setup(Product { x: None, y: None }, &mut rng)
                .unwrap();
        let proof = Groth16::<Bn254>::prove(
            &pk,
            Product {
                x: Some(Fr::from(3u64)),
                y: Some(Fr::from(5u64)),
            },
            &mut rng,
        )
        .unwrap();
        (
            serde_json::to_value(SnarkjsVerifyingKey::from_ark(&vk)).unwrap(),
            Groth16Proof::from_ark(&proof),
        )
    }

    #[test]
    fn accepts_valid_proof() {
        let (vk, proof) = fixture();
        assert!(proof.is_well_formed());
        assert!(verify_snarkjs(&vk, &["15".to_string()], &proof).unwrap());
    }

    #[test]
    fn rejects_wrong_public_signal() {
        let (vk, proof) = fixture();
        assert!(!verify_snarkjs(&vk, &["16".to_string()], &proof).unwrap());
    }

    #[test]
    fn wrong_signal_count_is_malformed() {
        let (vk, proof) = fixture();
        assert!(matches!(
            verify_snarkjs(&vk, &[], &proof),
            Err(VerifyError::MalformedSignals(_))
        ));
    }

    #[test]
    fn off_curve_point_is_malformed() {
        let (vk, mut proof) = fixture();
        proof.pi_a[0] = "1".into();
        proof.pi_a[1] = "1".into();
        assert!(matches!(
            verify_snarkjs(&vk, &["15".to_string()], &proof),
            Err(VerifyError::MalformedProof(_))
        ));
    }

    #[test]
    fn wire_format_matches_snarkjs() {
        let (vk, proof) = fixture();
        assert_eq!(vk["protocol"], "groth16");
        assert_eq!(vk["nPublic"], 1);
        assert_eq!(vk["IC"].as_array().unwrap().len(), 2);
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["curve"], "bn128");
        assert_eq!(json["pi_a"][2], "1");
        assert_eq!(json["pi_b"][2], serde_json::json!(["1", "0"]));
    }

    #[test]
    fn shape_check_catches_bad_tags_and_digits() {
        let (_, proof) = fixture();
        let mut bad = proof.clone();
        bad.protocol = "plonk".into();
        assert!(!bad.is_well_formed());
        let mut bad = proof.clone();
        bad.pi_b[1].pop();
        assert!(!bad.is_well_formed());
        let mut bad = proof;
        bad.pi_c[0] = "0x12".into();
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn infinity_round_trips() {
        let zero = <G1Affine as AffineRepr>::zero();
        assert_eq!(parse_g1(&g1_to_strings(&zero)).unwrap(), zero);
        let zero2 = <G2Affine as AffineRepr>::zero();
        assert_eq!(parse_g2(&g2_to_strings(&zero2)).unwrap(), zero2);
    }

    #[test]
    fn base_field_overflow_is_rejected() {
        assert!(parse_fq(&fq_modulus().to_string()).is_err());
        assert!(parse_fq("").is_err());
        assert_eq!(parse_fq("7").unwrap(), Fq::from(7u64));
    }
}
