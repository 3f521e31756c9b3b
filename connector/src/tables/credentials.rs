use rand::Rng;
use rand::seq::SliceRandom;

const PASSWORD_LENGTH: usize = 18;
const PASSWORD_DIGITS: usize = 2;
const PASSWORD_SYMBOLS: usize = 2;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

/// Generates the basic auth password protecting a Data Source webhook.
///
/// The password is 18 characters long, holds exactly 2 digits and 2 symbols, mixes upper and
/// lower case letters and never repeats a character.
pub(crate) fn generate_password<R: Rng + ?Sized>(rng: &mut R) -> String {
    let letters = PASSWORD_LENGTH - PASSWORD_DIGITS - PASSWORD_SYMBOLS;

    let mut chars: Vec<u8> = LETTERS
        .choose_multiple(rng, letters)
        .chain(DIGITS.choose_multiple(rng, PASSWORD_DIGITS))
        .chain(SYMBOLS.choose_multiple(rng, PASSWORD_SYMBOLS))
        .copied()
        .collect();
    chars.shuffle(rng);

    chars.into_iter().map(char::from).collect()
}
