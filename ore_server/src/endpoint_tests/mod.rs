mod checkout;
mod payments;
