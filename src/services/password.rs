use crate::error::CatalogError;

/// One-way credential hashing. Only hashes are ever stored or compared.
pub trait PasswordHasher: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `Validation` when the plaintext cannot be hashed.
    fn hash(&self, plaintext: &str) -> Result<String, CatalogError>;

    /// # Errors
    /// Returns `ExecutionError` when the stored hash is malformed.
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, CatalogError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, CatalogError> {
        bcrypt::hash(plaintext, self.cost)
            .map_err(|e| CatalogError::Validation(format!("password hashing failed: {e}")))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, CatalogError> {
        bcrypt::verify(plaintext, hash)
            .map_err(|e| CatalogError::ExecutionError(format!("stored password hash unreadable: {e}")))
    }
}
