#[cfg(test)]
mod memory;


#[cfg(test)]
mod auth_tests;

#[cfg(test)]
mod apply_tests;

#[cfg(test)]
mod student_tests;



#[cfg(test)]
mod professor_tests;

#[cfg(test)]
mod webhook_tests;
